use serde_json::json;

use crate::config::ServiceConfig;
use crate::pipeline::transport::{
    ChatMessage, ChatRequest, ChatTransport, FirstChoice, TransportError,
};

use super::{GenerationError, GenerationOptions, TextGenerator};

const GENERATION_PATH: &str = "chat/completions";

/// OpenAI chat-completions client.
pub struct OpenAiGenerator {
    transport: ChatTransport,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &ServiceConfig) -> Result<Self, TransportError> {
        Ok(Self {
            transport: ChatTransport::new(config, GENERATION_PATH)?,
            model: config.model.clone(),
        })
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Wire body for one generation call: system instruction, user data.
pub fn build_request<'a>(
    model: &'a str,
    instruction: &'a str,
    data: &'a str,
    options: &GenerationOptions,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage::system(instruction), ChatMessage::user(data)],
        temperature: options.temperature,
        response_format: options
            .json_object
            .then(|| json!({ "type": "json_object" })),
    }
}

impl TextGenerator for OpenAiGenerator {
    fn generate(
        &self,
        instruction: &str,
        data: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let _span = tracing::info_span!(
            "generate",
            model = %self.model,
            instruction_len = instruction.len(),
            data_len = data.len(),
        )
        .entered();

        let body = build_request(&self.model, instruction, data, options);
        match self.transport.send(&body)?.first_choice() {
            FirstChoice::Text(text) => {
                tracing::info!(response_len = text.len(), "Generation complete");
                Ok(text)
            }
            FirstChoice::NoChoices => Err(GenerationError::NoChoices),
            FirstChoice::Blank => Err(GenerationError::BlankContent),
        }
    }
}
