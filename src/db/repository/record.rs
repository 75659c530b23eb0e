use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const RECORD_COLUMNS: &str = "id, kind, language, title, content, korean_content,
     patient_name, patient_age, patient_nationality, patient_gender, patient_description,
     visit_purpose, medicines, quality, created_at";

pub fn insert_record(conn: &Connection, record: &NormalizedRecord) -> Result<(), DatabaseError> {
    let patient = record.patient.as_ref();
    conn.execute(
        "INSERT INTO records (id, kind, language, title, content, korean_content,
         patient_name, patient_age, patient_nationality, patient_gender, patient_description,
         visit_purpose, medicines, quality, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            record.id.to_string(),
            record.kind.as_str(),
            record.language.tag(),
            record.title,
            record.content,
            record.korean_content,
            patient.map(|p| p.name.as_str()),
            patient.and_then(|p| p.age),
            patient.map(|p| p.nationality.as_str()),
            patient.map(|p| p.gender.code()),
            patient.map(|p| p.description.as_str()),
            patient.map(|p| p.visit_purpose.as_str()),
            serde_json::to_string(&record.medicines)?,
            record.quality.as_str(),
            record.created_at.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_record(conn: &Connection, id: &Uuid) -> Result<Option<NormalizedRecord>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"),
            params![id.to_string()],
            read_record_row,
        )
        .optional()?;
    raw.map(row_to_record).transpose()
}

/// Write every field present in the patch in one statement.
///
/// Absent fields keep their stored value via `COALESCE`.
pub fn apply_record_patch(
    conn: &Connection,
    id: &Uuid,
    patch: &RecordPatch,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE records SET
         title = COALESCE(?2, title),
         content = COALESCE(?3, content),
         korean_content = COALESCE(?4, korean_content)
         WHERE id = ?1",
        params![
            id.to_string(),
            patch.title,
            patch.content,
            patch.korean_content,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Record".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Newest first, optionally restricted to one kind.
pub fn list_records(
    conn: &Connection,
    kind: Option<DocumentKind>,
) -> Result<Vec<RecordSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, title, created_at FROM records
         WHERE (?1 IS NULL OR kind = ?1)
         ORDER BY seq DESC",
    )?;

    let rows = stmt.query_map(params![kind.map(|k| k.as_str())], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (id, kind, title, created_at) = row?;
        summaries.push(RecordSummary {
            id: parse_uuid(&id)?,
            kind: DocumentKind::from_str(&kind)?,
            title,
            created_at: parse_date(&created_at)?,
        });
    }
    Ok(summaries)
}

struct RecordRow {
    id: String,
    kind: String,
    language: String,
    title: String,
    content: String,
    korean_content: String,
    patient_name: Option<String>,
    patient_age: Option<u32>,
    patient_nationality: Option<String>,
    patient_gender: Option<String>,
    patient_description: Option<String>,
    visit_purpose: Option<String>,
    medicines: String,
    quality: String,
    created_at: String,
}

fn read_record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        language: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        korean_content: row.get(5)?,
        patient_name: row.get(6)?,
        patient_age: row.get(7)?,
        patient_nationality: row.get(8)?,
        patient_gender: row.get(9)?,
        patient_description: row.get(10)?,
        visit_purpose: row.get(11)?,
        medicines: row.get(12)?,
        quality: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn row_to_record(row: RecordRow) -> Result<NormalizedRecord, DatabaseError> {
    let kind = DocumentKind::from_str(&row.kind)?;
    let patient = match kind {
        DocumentKind::Intake => Some(PatientFields {
            name: row.patient_name.unwrap_or_default(),
            age: row.patient_age,
            nationality: row.patient_nationality.unwrap_or_default(),
            gender: Gender::from_code(&row.patient_gender.unwrap_or_default()),
            description: row.patient_description.unwrap_or_default(),
            visit_purpose: row.visit_purpose.unwrap_or_default(),
        }),
        DocumentKind::Prescription => None,
    };

    Ok(NormalizedRecord {
        id: parse_uuid(&row.id)?,
        kind,
        language: Language::from_identifier(&row.language).ok_or_else(|| {
            DatabaseError::InvalidEnum {
                field: "Language".into(),
                value: row.language.clone(),
            }
        })?,
        title: row.title,
        content: row.content,
        korean_content: row.korean_content,
        patient,
        medicines: serde_json::from_str(&row.medicines)?,
        quality: ContentQuality::from_str(&row.quality)?,
        created_at: parse_date(&row.created_at)?,
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

fn parse_date(raw: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
