use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ContentQuality, DocumentKind, Gender};
use super::language::Language;

/// Structured patient fields carried on intake records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFields {
    pub name: String,
    pub age: Option<u32>,
    pub nationality: String,
    pub gender: Gender,
    pub description: String,
    pub visit_purpose: String,
}

/// Final output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub language: Language,
    pub title: String,
    /// Text in the patient's language.
    pub content: String,
    pub korean_content: String,
    pub patient: Option<PatientFields>,
    /// Extracted medicine names, in label order (prescriptions only).
    pub medicines: Vec<String>,
    pub quality: ContentQuality,
    pub created_at: NaiveDate,
}

impl NormalizedRecord {
    /// True when any AI-derived field is blank.
    pub fn has_blank_ai_fields(&self) -> bool {
        self.title.trim().is_empty()
            || self.content.trim().is_empty()
            || self.korean_content.trim().is_empty()
    }

    /// Apply a patch in place. Fields absent from the patch are untouched.
    pub fn apply_patch(&mut self, patch: &RecordPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(korean) = &patch.korean_content {
            self.korean_content = korean.clone();
        }
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            kind: self.kind,
            title: self.title.clone(),
            created_at: self.created_at,
        }
    }
}

/// Partial update of AI-derived fields, written atomically by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub korean_content: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.korean_content.is_none()
    }
}

/// List item for recency-ordered listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub title: String,
    pub created_at: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> NormalizedRecord {
        NormalizedRecord {
            id: Uuid::new_v4(),
            kind: DocumentKind::Intake,
            language: Language::English,
            title: "Fever".into(),
            content: "".into(),
            korean_content: "발열".into(),
            patient: None,
            medicines: vec![],
            quality: ContentQuality::Complete,
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        }
    }

    #[test]
    fn blank_content_is_detected() {
        assert!(record().has_blank_ai_fields());
    }

    #[test]
    fn whitespace_counts_as_blank() {
        let mut r = record();
        r.content = "Fever.".into();
        r.title = "   ".into();
        assert!(r.has_blank_ai_fields());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut r = record();
        r.apply_patch(&RecordPatch {
            content: Some("Fever for 3 days.".into()),
            ..Default::default()
        });
        assert_eq!(r.title, "Fever");
        assert_eq!(r.content, "Fever for 3 days.");
        assert_eq!(r.korean_content, "발열");
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_value(record()).unwrap();
        assert!(json.get("koreanContent").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["kind"], "intake");
        assert_eq!(json["language"], "en");
    }
}
