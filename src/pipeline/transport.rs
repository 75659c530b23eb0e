//! Blocking chat-completion transport shared by the extraction and
//! generation clients.

use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ServiceConfig;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Invalid header value for {0}")]
    InvalidHeader(String),

    #[error("Service unreachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Undecodable response body: {0}")]
    Decode(String),
}

// ═══════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: MessageContent<'a>,
}

impl<'a> ChatMessage<'a> {
    pub fn system(text: &'a str) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text),
        }
    }

    pub fn user(text: &'a str) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text),
        }
    }

    pub fn user_image(data_url: String) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(vec![ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_url },
            }]),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// What the first choice of a response carried.
#[derive(Debug, Clone, PartialEq)]
pub enum FirstChoice {
    NoChoices,
    Blank,
    Text(String),
}

impl ChatResponse {
    pub fn first_choice(self) -> FirstChoice {
        let Some(choice) = self.choices.into_iter().next() else {
            return FirstChoice::NoChoices;
        };
        match choice.message.content {
            Some(text) if !text.trim().is_empty() => FirstChoice::Text(text),
            _ => FirstChoice::Blank,
        }
    }
}

// ═══════════════════════════════════════════
// Transport
// ═══════════════════════════════════════════

/// One pooled blocking client bound to a chat-completions URL.
pub struct ChatTransport {
    client: reqwest::blocking::Client,
    url: String,
    timeout_secs: u64,
}

impl ChatTransport {
    /// `path` is appended to the configured base URL.
    pub fn new(config: &ServiceConfig, path: &str) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| TransportError::InvalidHeader("authorization".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        for (name, value) in &config.extra_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: join_url(&config.base_url, path),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one chat-completion request and decode the response envelope.
    pub fn send(&self, body: &ChatRequest<'_>) -> Result<ChatResponse, TransportError> {
        let start = Instant::now();
        let response = self.client.post(&self.url).json(body).send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                TransportError::Connection(self.url.clone())
            } else {
                TransportError::Client(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Chat completion rejected"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        tracing::debug!(
            choices = parsed.choices.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );
        Ok(parsed)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(base_url: &str) -> ServiceConfig {
        ServiceConfig {
            base_url: base_url.into(),
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
            connect_timeout_secs: 5,
            request_timeout_secs: 60,
            extra_headers: vec![("OpenAI-Organization".into(), "org-1".into())],
        }
    }

    #[test]
    fn url_joins_without_double_slash() {
        let t = ChatTransport::new(&service("https://api.openai.com/v1/"), "/chat/completions").unwrap();
        assert_eq!(t.url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn invalid_header_is_rejected() {
        let mut cfg = service("https://api.openai.com/v1");
        cfg.extra_headers = vec![("bad header".into(), "x".into())];
        assert!(matches!(
            ChatTransport::new(&cfg, "chat/completions"),
            Err(TransportError::InvalidHeader(_))
        ));
    }

    #[test]
    fn request_omits_absent_options() {
        let req = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("data")],
            temperature: None,
            response_format: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "data");
    }

    #[test]
    fn image_message_uses_content_parts() {
        let msg = ChatMessage::user_image("data:application/octet-stream;base64,AAAA".into());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "image_url");
        assert_eq!(
            json["content"][0]["image_url"]["url"],
            "data:application/octet-stream;base64,AAAA"
        );
    }

    #[test]
    fn first_choice_classification() {
        let none: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(none.first_choice(), FirstChoice::NoChoices);

        let missing: ChatResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.first_choice(), FirstChoice::NoChoices);

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert_eq!(blank.first_choice(), FirstChoice::Blank);

        let null: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(null.first_choice(), FirstChoice::Blank);

        let text: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"hi"}},{"message":{"content":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(text.first_choice(), FirstChoice::Text("hi".into()));
    }

    #[test]
    fn unreachable_service_is_a_connection_error() {
        let mut cfg = service("http://127.0.0.1:9");
        cfg.connect_timeout_secs = 1;
        cfg.request_timeout_secs = 2;
        let t = ChatTransport::new(&cfg, "chat/completions").unwrap();
        let req = ChatRequest {
            model: "m",
            messages: vec![ChatMessage::user("x")],
            temperature: None,
            response_format: None,
        };
        assert!(matches!(
            t.send(&req),
            Err(TransportError::Connection(_)) | Err(TransportError::Timeout(_)) | Err(TransportError::Client(_))
        ));
    }
}
