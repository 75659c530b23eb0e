pub mod upstage;

pub use upstage::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::pipeline::transport::TransportError;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Extraction service returned no choices")]
    NoChoices,

    #[error("Extraction service returned blank content")]
    BlankContent,

    #[error("Extraction content is not valid JSON: {0}")]
    MalformedContent(String),
}

/// Image → ordered medicine names (allows mocking).
pub trait MedicineExtractor: Send + Sync {
    fn extract(&self, image: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Mock extractor for testing. Returns a configured list or failure.
pub struct MockExtractor {
    medicines: Vec<String>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new(medicines: &[&str]) -> Self {
        Self {
            medicines: medicines.iter().map(|m| m.to_string()).collect(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with a transport error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            medicines: Vec::new(),
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MedicineExtractor for MockExtractor {
    fn extract(&self, _image: &[u8]) -> Result<Vec<String>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(ExtractionError::Transport(TransportError::Client(
                message.clone(),
            ))),
            None => Ok(self.medicines.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_list() {
        let mock = MockExtractor::new(&["Ibuprofen", "Loratadine"]);
        assert_eq!(mock.extract(b"img").unwrap(), vec!["Ibuprofen", "Loratadine"]);
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn failing_mock_returns_transport_error() {
        let mock = MockExtractor::failing("down");
        assert!(matches!(
            mock.extract(b"img"),
            Err(ExtractionError::Transport(_))
        ));
    }
}
