//! Runs pipelines and persists their records.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::{DatabaseError, RecordStore, SqliteRecordStore};
use crate::models::{
    DocumentKind, IntakeRequest, NormalizedRecord, PrescriptionRequest, RecordSummary,
};
use crate::pipeline::extraction::UpstageExtractor;
use crate::pipeline::generation::OpenAiGenerator;
use crate::pipeline::transport::TransportError;
use crate::pipeline::{
    greeting, translate_chat_message, ChatLine, ChatSeed, Pipeline, PipelineError,
    PipelineOutput, TranslatedMessage,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Client setup failed: {0}")]
    Client(#[from] TransportError),

    #[error("Record not found: {0}")]
    NotFound(Uuid),
}

/// Pipeline plus record store.
pub struct MediMate {
    pipeline: Pipeline,
    store: Arc<dyn RecordStore>,
}

impl MediMate {
    pub fn new(pipeline: Pipeline, store: Arc<dyn RecordStore>) -> Self {
        Self { pipeline, store }
    }

    /// Wire live clients and the SQLite store from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let extractor = Arc::new(UpstageExtractor::new(&config.extraction)?);
        let generator = Arc::new(OpenAiGenerator::new(&config.generation)?);
        let store = Arc::new(SqliteRecordStore::open(&config.database_path)?);
        let pipeline = Pipeline::new(extractor, generator, config.pipeline.clone());
        Ok(Self::new(pipeline, store))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the intake pipeline; the record is stored only on success.
    pub fn submit_intake(&self, request: &IntakeRequest) -> Result<PipelineOutput, ServiceError> {
        let output = self.pipeline.run_intake(request)?;
        self.store.create(&output.record)?;
        tracing::info!(record_id = %output.record.id, "Intake record stored");
        Ok(output)
    }

    pub fn submit_prescription(
        &self,
        request: &PrescriptionRequest,
    ) -> Result<PipelineOutput, ServiceError> {
        let output = self.pipeline.run_prescription(request)?;
        self.store.create(&output.record)?;
        tracing::info!(record_id = %output.record.id, "Prescription record stored");
        Ok(output)
    }

    pub fn get(&self, id: &Uuid) -> Result<NormalizedRecord, ServiceError> {
        self.store.get(id)?.ok_or(ServiceError::NotFound(*id))
    }

    pub fn list(&self, kind: Option<DocumentKind>) -> Result<Vec<RecordSummary>, ServiceError> {
        Ok(self.store.list(kind)?)
    }

    /// Fill blank AI fields of a stored record. Returns the record as stored
    /// afterwards; a fully populated record comes back untouched.
    pub fn refresh(&self, id: &Uuid) -> Result<NormalizedRecord, ServiceError> {
        let mut record = self.get(id)?;
        let patch = self.pipeline.refresh(&record)?;
        if patch.is_empty() {
            return Ok(record);
        }
        self.store.apply_patch(id, &patch)?;
        record.apply_patch(&patch);
        tracing::info!(record_id = %id, "Record refreshed");
        Ok(record)
    }

    pub fn translate(&self, text: &str, language: &str) -> TranslatedMessage {
        let target = self.pipeline.normalize_language(language);
        translate_chat_message(self.pipeline.generator().as_ref(), text, target)
    }

    /// First line of a chat room: seeded from a record, or a greeting.
    pub fn open_chat(&self, record_id: Option<&Uuid>, language: &str) -> Result<ChatLine, ServiceError> {
        match record_id {
            Some(id) => Ok(ChatSeed::from_record(&self.get(id)?)),
            None => Ok(greeting(self.pipeline.normalize_language(language))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use crate::db::MemoryRecordStore;
    use crate::models::{ContentQuality, Gender};
    use crate::pipeline::extraction::MockExtractor;
    use crate::pipeline::generation::MockGenerator;
    use crate::pipeline::{FailureKind, Sender};

    const INTAKE_JSON: &str = r#"{"title":"Fever","content":"Fever for three days.","koreanContent":"3일간 발열."}"#;

    fn service(
        medicines: &[&str],
        generator: MockGenerator,
    ) -> (MediMate, Arc<MemoryRecordStore>, Arc<MockGenerator>) {
        let store = Arc::new(MemoryRecordStore::new());
        let generator = Arc::new(generator);
        let pipeline = Pipeline::new(
            Arc::new(MockExtractor::new(medicines)),
            generator.clone(),
            PipelineSettings::default(),
        );
        (MediMate::new(pipeline, store.clone()), store, generator)
    }

    fn intake() -> IntakeRequest {
        IntakeRequest {
            language: "english".into(),
            name: "Jane".into(),
            age: Some(34),
            nationality: "USA".into(),
            gender: Gender::Female,
            description: "fever".into(),
            visit_purpose: String::new(),
        }
    }

    #[test]
    fn successful_intake_is_persisted() {
        let (svc, store, _) = service(&[], MockGenerator::new(INTAKE_JSON));
        let out = svc.submit_intake(&intake()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(svc.get(&out.record.id).unwrap(), out.record);
    }

    #[test]
    fn failed_run_persists_nothing() {
        let (svc, store, _) = service(&[], MockGenerator::new("not json"));
        let err = svc.submit_intake(&intake()).unwrap_err();
        assert_eq!(err.to_string(), "generation failed");
        assert!(store.is_empty());

        let (svc, store, _) = service(&[], MockGenerator::new("irrelevant"));
        let err = svc
            .submit_prescription(&PrescriptionRequest::new("english", vec![1]))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Pipeline(PipelineError { kind: FailureKind::NoMedicines, .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn degraded_prescription_is_persisted_with_flag() {
        let (svc, _, _) = service(&["Ibuprofen"], MockGenerator::new("plain text answer"));
        let out = svc
            .submit_prescription(&PrescriptionRequest::new("english", vec![1]))
            .unwrap();
        let stored = svc.get(&out.record.id).unwrap();
        assert_eq!(stored.quality, ContentQuality::Degraded);
        assert_eq!(stored.korean_content, "plain text answer");
    }

    #[test]
    fn refresh_patches_store_and_is_idempotent() {
        let generator = MockGenerator::with_results(vec![
            Ok(r#"{"title":"Fever","content":"","koreanContent":"3일간 발열."}"#.into()),
            Ok(INTAKE_JSON.into()),
        ]);
        let (svc, _, generator) = service(&[], generator);
        let id = svc.submit_intake(&intake()).unwrap().record.id;
        assert_eq!(svc.get(&id).unwrap().content, "");

        let refreshed = svc.refresh(&id).unwrap();
        assert_eq!(refreshed.content, "Fever for three days.");
        assert_eq!(svc.get(&id).unwrap(), refreshed);
        assert_eq!(generator.call_count(), 2);

        let again = svc.refresh(&id).unwrap();
        assert_eq!(again, refreshed);
        assert_eq!(generator.call_count(), 2);
    }

    #[test]
    fn refresh_unknown_record_is_not_found() {
        let (svc, _, _) = service(&[], MockGenerator::new(INTAKE_JSON));
        assert!(matches!(
            svc.refresh(&Uuid::new_v4()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn chat_opens_from_record_or_greeting() {
        let (svc, _, _) = service(&[], MockGenerator::new(INTAKE_JSON));
        let id = svc.submit_intake(&intake()).unwrap().record.id;

        let seeded = svc.open_chat(Some(&id), "english").unwrap();
        assert_eq!(seeded.sender, Sender::User);
        assert_eq!(seeded.korean_message, "3일간 발열.");

        let greeted = svc.open_chat(None, "chinese").unwrap();
        assert_eq!(greeted.sender, Sender::Medi);
        assert_eq!(greeted.message, "您好，请问有什么可以帮您的吗？");
    }

    #[test]
    fn translate_normalizes_language() {
        let (svc, _, _) = service(&[], MockGenerator::new("I have a fever."));
        let out = svc.translate("열이 나요.", "EN");
        assert_eq!(out.message, "I have a fever.");
        assert_eq!(out.korean_message, "열이 나요.");
    }
}
