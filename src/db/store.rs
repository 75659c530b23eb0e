use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use uuid::Uuid;

use super::repository::{apply_record_patch, get_record, insert_record, list_records};
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::{DocumentKind, NormalizedRecord, RecordPatch, RecordSummary};

/// Where normalized records live once a run succeeds.
pub trait RecordStore: Send + Sync {
    fn create(&self, record: &NormalizedRecord) -> Result<(), DatabaseError>;

    fn get(&self, id: &Uuid) -> Result<Option<NormalizedRecord>, DatabaseError>;

    /// Apply every field of `patch` in one atomic write.
    fn apply_patch(&self, id: &Uuid, patch: &RecordPatch) -> Result<(), DatabaseError>;

    /// Newest first.
    fn list(&self, kind: Option<DocumentKind>) -> Result<Vec<RecordSummary>, DatabaseError>;
}

/// SQLite-backed store. One connection, serialized behind a mutex.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_database(path)?),
        })
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(open_memory_database()?),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

impl RecordStore for SqliteRecordStore {
    fn create(&self, record: &NormalizedRecord) -> Result<(), DatabaseError> {
        self.with_conn(|conn| insert_record(conn, record))
    }

    fn get(&self, id: &Uuid) -> Result<Option<NormalizedRecord>, DatabaseError> {
        self.with_conn(|conn| get_record(conn, id))
    }

    fn apply_patch(&self, id: &Uuid, patch: &RecordPatch) -> Result<(), DatabaseError> {
        self.with_conn(|conn| apply_record_patch(conn, id, patch))
    }

    fn list(&self, kind: Option<DocumentKind>) -> Result<Vec<RecordSummary>, DatabaseError> {
        self.with_conn(|conn| list_records(conn, kind))
    }
}

/// In-process store for tests and dry runs. Insertion order is recency order.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<NormalizedRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, record: &NormalizedRecord) -> Result<(), DatabaseError> {
        let mut records = self.records.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(DatabaseError::ConstraintViolation(format!(
                "duplicate record id {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Result<Option<NormalizedRecord>, DatabaseError> {
        let records = self.records.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(records.iter().find(|r| r.id == *id).cloned())
    }

    fn apply_patch(&self, id: &Uuid, patch: &RecordPatch) -> Result<(), DatabaseError> {
        let mut records = self.records.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity_type: "Record".into(),
                id: id.to_string(),
            })?;
        record.apply_patch(patch);
        Ok(())
    }

    fn list(&self, kind: Option<DocumentKind>) -> Result<Vec<RecordSummary>, DatabaseError> {
        let records = self.records.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .map(NormalizedRecord::summary)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentQuality, Language};
    use chrono::NaiveDate;

    fn record(kind: DocumentKind, title: &str) -> NormalizedRecord {
        NormalizedRecord {
            id: Uuid::new_v4(),
            kind,
            language: Language::English,
            title: title.into(),
            content: "".into(),
            korean_content: "내용".into(),
            patient: None,
            medicines: vec![],
            quality: ContentQuality::Complete,
            created_at: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        }
    }

    fn exercise(store: &dyn RecordStore) {
        let a = record(DocumentKind::Prescription, "A");
        let b = record(DocumentKind::Prescription, "B");
        store.create(&a).unwrap();
        store.create(&b).unwrap();

        let titles: Vec<String> = store.list(None).unwrap().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["B", "A"]);
        assert!(store.list(Some(DocumentKind::Intake)).unwrap().is_empty());

        store
            .apply_patch(
                &a.id,
                &RecordPatch {
                    content: Some("Filled".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let loaded = store.get(&a.id).unwrap().unwrap();
        assert_eq!(loaded.content, "Filled");
        assert_eq!(loaded.korean_content, "내용");

        assert!(store.get(&Uuid::new_v4()).unwrap().is_none());
        assert!(matches!(
            store.apply_patch(&Uuid::new_v4(), &RecordPatch::default()),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn sqlite_store_contract() {
        exercise(&SqliteRecordStore::in_memory().unwrap());
    }

    #[test]
    fn memory_store_contract() {
        let store = MemoryRecordStore::new();
        exercise(&store);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let r = record(DocumentKind::Intake, "Persisted");
        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store.create(&r).unwrap();
        }
        let store = SqliteRecordStore::open(&path).unwrap();
        assert_eq!(store.get(&r.id).unwrap().unwrap().title, "Persisted");
    }
}
