use std::fmt;

use serde::{Deserialize, Serialize};

use super::enums::Gender;

/// Pre-visit intake form as submitted by the patient.
///
/// `language` is the caller's free-form identifier; the pipeline
/// normalizes it. Missing fields deserialize as empty values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntakeRequest {
    pub language: String,
    pub name: String,
    pub age: Option<u32>,
    pub nationality: String,
    pub gender: Gender,
    pub description: String,
    /// Blank means the per-language default phrase.
    pub visit_purpose: String,
}

/// Photographed prescription label plus the patient's language.
#[derive(Clone)]
pub struct PrescriptionRequest {
    pub language: String,
    pub image: Vec<u8>,
}

impl PrescriptionRequest {
    pub fn new(language: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            language: language.into(),
            image,
        }
    }
}

impl fmt::Debug for PrescriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrescriptionRequest")
            .field("language", &self.language)
            .field("image_bytes", &self.image.len())
            .finish()
    }
}
