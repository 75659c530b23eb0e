use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use super::content::{
    assemble_intake, assemble_prescription, build_data_prompt, build_instruction_prompt,
    build_refresh_patch, needs_refresh, parse_response, DataFields, LanguageNormalizer,
    ParseError, ParseOutcome, ParseStrategy,
};
use super::extraction::{ExtractionError, MedicineExtractor};
use super::generation::{GenerationError, GenerationOptions, TextGenerator};
use crate::config::PipelineSettings;
use crate::models::{
    DocumentKind, IntakeRequest, Language, NormalizedRecord, PrescriptionRequest, RecordPatch,
};

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Built,
    Extracting,
    Generating,
    Parsing,
    Assembling,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Built => "built",
            Stage::Extracting => "extracting",
            Stage::Generating => "generating",
            Stage::Parsing => "parsing",
            Stage::Assembling => "assembling",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Why a run failed. All kinds are gateway-class and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection, timeout, non-success status or undecodable body.
    Transport,
    /// No choices, or blank first-choice content.
    EmptyResponse,
    MalformedJson,
    /// Extraction succeeded but found no medicine names.
    NoMedicines,
}

/// Terminal failure of a run. Callers only ever see "generation failed";
/// the stage, kind and message are for logs and diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("generation failed")]
pub struct PipelineError {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ExtractionError> for FailureKind {
    fn from(e: &ExtractionError) -> Self {
        match e {
            ExtractionError::Transport(_) => FailureKind::Transport,
            ExtractionError::NoChoices | ExtractionError::BlankContent => {
                FailureKind::EmptyResponse
            }
            ExtractionError::MalformedContent(_) => FailureKind::MalformedJson,
        }
    }
}

impl From<&GenerationError> for FailureKind {
    fn from(e: &GenerationError) -> Self {
        match e {
            GenerationError::Transport(_) => FailureKind::Transport,
            GenerationError::NoChoices | GenerationError::BlankContent => {
                FailureKind::EmptyResponse
            }
        }
    }
}

impl From<&ParseError> for FailureKind {
    fn from(e: &ParseError) -> Self {
        match e {
            ParseError::MalformedJson(_) => FailureKind::MalformedJson,
        }
    }
}

/// Successful run: the record plus how it was produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub record: NormalizedRecord,
    pub strategy: ParseStrategy,
    pub stages: Vec<Stage>,
}

/// Records stage transitions for one run.
struct StageTracker {
    kind: DocumentKind,
    current: Stage,
    history: Vec<Stage>,
    started: Instant,
}

impl StageTracker {
    fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            current: Stage::Built,
            history: vec![Stage::Built],
            started: Instant::now(),
        }
    }

    fn advance(&mut self, stage: Stage) {
        self.current = stage;
        self.history.push(stage);
        tracing::info!(
            kind = %self.kind,
            stage = %stage,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Pipeline stage"
        );
    }

    fn fail(&self, kind: FailureKind, message: impl Into<String>) -> PipelineError {
        let message = message.into();
        tracing::error!(
            kind = %self.kind,
            stage = %self.current,
            failure = ?kind,
            error = %message,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Pipeline failed"
        );
        PipelineError {
            stage: self.current,
            kind,
            message,
        }
    }

    fn finish(mut self) -> Vec<Stage> {
        self.advance(Stage::Done);
        self.history
    }
}

/// Sequences extraction, generation, parsing and assembly per document kind.
///
/// Clients are shared behind `Arc`, so one pipeline can serve concurrent runs.
pub struct Pipeline {
    extractor: Arc<dyn MedicineExtractor>,
    generator: Arc<dyn TextGenerator>,
    settings: PipelineSettings,
    normalizer: LanguageNormalizer,
    clock: fn() -> DateTime<Utc>,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn MedicineExtractor>,
        generator: Arc<dyn TextGenerator>,
        settings: PipelineSettings,
    ) -> Self {
        let normalizer = LanguageNormalizer::new(settings.default_language);
        Self {
            extractor,
            generator,
            settings,
            normalizer,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used for `createdAt`.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    pub fn normalize_language(&self, input: &str) -> Language {
        self.normalizer.normalize(input)
    }

    /// Local date in the clinic's region.
    pub fn today(&self) -> NaiveDate {
        (self.clock)()
            .with_timezone(&self.settings.clinic_offset())
            .date_naive()
    }

    fn intake_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: Some(self.settings.intake_temperature),
            json_object: true,
        }
    }

    /// Generate the intake narrative and parse it.
    fn generate_intake(
        &self,
        tracker: &mut StageTracker,
        request: &IntakeRequest,
        lang: Language,
    ) -> Result<ParseOutcome, PipelineError> {
        tracker.advance(Stage::Generating);
        let instruction = build_instruction_prompt(DocumentKind::Intake, lang);
        let data = build_data_prompt(&DataFields::Intake {
            request,
            language: lang,
            include_description: self.settings.include_description,
        });
        let raw = self
            .generator
            .generate(&instruction, &data, &self.intake_options())
            .map_err(|e| tracker.fail((&e).into(), e.to_string()))?;

        tracker.advance(Stage::Parsing);
        parse_response(DocumentKind::Intake, lang, &raw)
            .map_err(|e| tracker.fail((&e).into(), e.to_string()))
    }

    /// Intake form → bilingual symptom record.
    pub fn run_intake(&self, request: &IntakeRequest) -> Result<PipelineOutput, PipelineError> {
        let lang = self.normalize_language(&request.language);
        let _span = tracing::info_span!(
            "run_intake",
            language = %lang,
            description_len = request.description.len(),
        )
        .entered();

        let mut tracker = StageTracker::new(DocumentKind::Intake);
        let outcome = self.generate_intake(&mut tracker, request, lang)?;

        tracker.advance(Stage::Assembling);
        let record = assemble_intake(
            request,
            lang,
            &outcome,
            self.settings.composition,
            self.today(),
        );

        Ok(PipelineOutput {
            record,
            strategy: outcome.strategy,
            stages: tracker.finish(),
        })
    }

    /// Prescription photo → per-medicine explanation record.
    pub fn run_prescription(
        &self,
        request: &PrescriptionRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        let lang = self.normalize_language(&request.language);
        let _span = tracing::info_span!(
            "run_prescription",
            language = %lang,
            image_bytes = request.image.len(),
        )
        .entered();

        let mut tracker = StageTracker::new(DocumentKind::Prescription);

        tracker.advance(Stage::Extracting);
        let medicines = self
            .extractor
            .extract(&request.image)
            .map_err(|e| tracker.fail((&e).into(), e.to_string()))?;
        if medicines.is_empty() {
            return Err(tracker.fail(
                FailureKind::NoMedicines,
                "no medicine names found on the prescription",
            ));
        }
        tracing::info!(count = medicines.len(), "Medicines extracted");

        tracker.advance(Stage::Generating);
        let instruction = build_instruction_prompt(DocumentKind::Prescription, lang);
        let data = build_data_prompt(&DataFields::Prescription {
            medicines: &medicines,
        });
        let raw = self
            .generator
            .generate(&instruction, &data, &GenerationOptions::default())
            .map_err(|e| tracker.fail((&e).into(), e.to_string()))?;

        tracker.advance(Stage::Parsing);
        let outcome = parse_response(DocumentKind::Prescription, lang, &raw)
            .map_err(|e| tracker.fail((&e).into(), e.to_string()))?;

        tracker.advance(Stage::Assembling);
        let record = assemble_prescription(lang, &medicines, &outcome, self.today());

        Ok(PipelineOutput {
            record,
            strategy: outcome.strategy,
            stages: tracker.finish(),
        })
    }

    /// Patch for the blank AI fields of an intake record.
    ///
    /// A fully populated record (or a prescription) yields an empty patch
    /// without calling the generator.
    pub fn refresh(&self, record: &NormalizedRecord) -> Result<RecordPatch, PipelineError> {
        let _span = tracing::info_span!("refresh", record_id = %record.id).entered();

        if !needs_refresh(record) {
            tracing::info!("Record fully populated, nothing to refresh");
            return Ok(RecordPatch::default());
        }

        let request = request_from_record(record);
        let mut tracker = StageTracker::new(DocumentKind::Intake);
        let outcome = self.generate_intake(&mut tracker, &request, record.language)?;

        tracker.advance(Stage::Assembling);
        let patch = build_refresh_patch(record, &outcome);
        tracker.finish();
        Ok(patch)
    }
}

/// Rebuild the intake form a record was generated from.
fn request_from_record(record: &NormalizedRecord) -> IntakeRequest {
    let mut request = IntakeRequest {
        language: record.language.tag().to_string(),
        ..Default::default()
    };
    if let Some(patient) = &record.patient {
        request.name = patient.name.clone();
        request.age = patient.age;
        request.nationality = patient.nationality.clone();
        request.gender = patient.gender.clone();
        request.description = patient.description.clone();
        request.visit_purpose = patient.visit_purpose.clone();
    }
    request
}
