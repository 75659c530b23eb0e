pub mod openai;

pub use openai::*;

use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;

use crate::pipeline::transport::TransportError;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Generation service returned no choices")]
    NoChoices,

    #[error("Generation service returned blank content")]
    BlankContent,
}

/// Per-call knobs. `temperature: None` leaves the service default.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    /// Ask the service for a JSON-object response.
    pub json_object: bool,
}

/// Instruction + data prompt → raw response text (allows mocking).
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        instruction: &str,
        data: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}

/// One call as seen by [`MockGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub instruction: String,
    pub data: String,
    pub options: GenerationOptions,
}

/// Mock generator for testing. Replays queued responses, then repeats the
/// last one. Records every call it receives.
pub struct MockGenerator {
    queue: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Result<String, String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGenerator {
    pub fn new(response: &str) -> Self {
        Self::with_results(vec![Ok(response.to_string())])
    }

    /// Every call fails with a transport error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self::with_results(vec![Err(message.to_string())])
    }

    /// Queue of responses; `Err` entries become transport failures.
    pub fn with_results(results: Vec<Result<String, String>>) -> Self {
        let last = results
            .last()
            .cloned()
            .unwrap_or_else(|| Ok(String::new()));
        Self {
            queue: Mutex::new(results.into()),
            last: Mutex::new(last),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl TextGenerator for MockGenerator {
    fn generate(
        &self,
        instruction: &str,
        data: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                instruction: instruction.to_string(),
                data: data.to_string(),
                options: *options,
            });
        }

        let next = self
            .queue
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .or_else(|| self.last.lock().ok().map(|l| l.clone()))
            .unwrap_or_else(|| Ok(String::new()));

        match next {
            Ok(text) if text.trim().is_empty() => Err(GenerationError::BlankContent),
            Ok(text) => Ok(text),
            Err(message) => Err(GenerationError::Transport(TransportError::Client(message))),
        }
    }
}
