use base64::Engine;
use serde_json::json;

use crate::config::ServiceConfig;
use crate::pipeline::transport::{
    ChatMessage, ChatRequest, ChatTransport, FirstChoice, TransportError,
};

use super::{ExtractionError, MedicineExtractor};

const EXTRACTION_PATH: &str = "v1/information-extraction/chat/completions";

/// Upstage information-extraction client. Reads medicine names off a
/// prescription label image using a one-field JSON schema.
pub struct UpstageExtractor {
    transport: ChatTransport,
    model: String,
}

impl UpstageExtractor {
    pub fn new(config: &ServiceConfig) -> Result<Self, TransportError> {
        Ok(Self {
            transport: ChatTransport::new(config, EXTRACTION_PATH)?,
            model: config.model.clone(),
        })
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }
}

/// `data:` URL carrying the raw image bytes.
pub fn image_data_url(image: &[u8]) -> String {
    format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(image)
    )
}

/// Response schema: a single `medicine` array of strings.
pub fn medicine_schema() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "document_schema",
            "schema": {
                "type": "object",
                "properties": {
                    "medicine": {
                        "type": "array",
                        "description": "Names of every medicine printed on the prescription, in label order",
                        "items": { "type": "string" }
                    }
                }
            }
        }
    })
}

/// Read the `medicine` array from extraction content.
///
/// A missing or non-array field yields an empty list. Non-string items are
/// skipped. Order and duplicates are kept as returned.
pub fn parse_medicine_list(content: &str) -> Result<Vec<String>, ExtractionError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| ExtractionError::MalformedContent(e.to_string()))?;

    let Some(items) = value.get("medicine").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(name) => names.push(name.to_string()),
            None => tracing::warn!("Skipping non-string medicine item"),
        }
    }
    Ok(names)
}

impl MedicineExtractor for UpstageExtractor {
    fn extract(&self, image: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let _span = tracing::info_span!("extract_medicines", image_bytes = image.len()).entered();

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user_image(image_data_url(image))],
            temperature: None,
            response_format: Some(medicine_schema()),
        };

        let content = match self.transport.send(&body)?.first_choice() {
            FirstChoice::Text(text) => text,
            FirstChoice::NoChoices => return Err(ExtractionError::NoChoices),
            FirstChoice::Blank => return Err(ExtractionError::BlankContent),
        };

        let names = parse_medicine_list(&content)?;
        tracing::info!(count = names.len(), "Medicine names extracted");
        Ok(names)
    }
}
