//! Chat message translation between patient and clinic staff.

use serde::{Deserialize, Serialize};

use super::content::{build_translation_data, build_translation_prompt};
use super::generation::{GenerationOptions, TextGenerator};
use crate::models::{Language, NormalizedRecord};

/// Stored in place of a translation the service could not produce.
pub const TRANSLATION_FALLBACK: &str = "번역에 실패했습니다.";

const TRANSLATION_TEMPERATURE: f32 = 0.7;

const KOREAN_GREETING: &str = "안녕하세요. 무엇을 도와드릴까요?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Medi,
}

/// One chat line in both the patient's language and Korean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLine {
    pub sender: Sender,
    pub message: String,
    pub korean_message: String,
}

/// Translation result; `translated` is false when the fallback was used.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedMessage {
    pub message: String,
    pub korean_message: String,
    pub translated: bool,
}

/// Translate `text` into `target`.
///
/// Korean target: the translation is the Korean message and the original
/// stays as the message. Any other target: the original is the Korean
/// message and the translation is the message. Failures never propagate;
/// the fixed fallback text takes the translation's place.
pub fn translate_chat_message(
    generator: &dyn TextGenerator,
    text: &str,
    target: Language,
) -> TranslatedMessage {
    let _span = tracing::info_span!("translate", language = %target, text_len = text.len()).entered();

    let options = GenerationOptions {
        temperature: Some(TRANSLATION_TEMPERATURE),
        json_object: false,
    };
    let result = generator.generate(
        &build_translation_prompt(target),
        &build_translation_data(text, target),
        &options,
    );

    let (translation, translated) = match result {
        Ok(out) if !out.trim().is_empty() => (out.trim().to_string(), true),
        Ok(_) => {
            tracing::warn!("Blank translation, using fallback");
            (TRANSLATION_FALLBACK.to_string(), false)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Translation failed, using fallback");
            (TRANSLATION_FALLBACK.to_string(), false)
        }
    };

    if target.is_korean() {
        TranslatedMessage {
            message: text.to_string(),
            korean_message: translation,
            translated,
        }
    } else {
        TranslatedMessage {
            message: translation,
            korean_message: text.to_string(),
            translated,
        }
    }
}

/// Opening line of a fresh chat room. Languages without a greeting reuse
/// the Korean text.
pub fn greeting(lang: Language) -> ChatLine {
    let message = match lang {
        Language::English => "Hello. How can I help you?",
        Language::Chinese => "您好，请问有什么可以帮您的吗？",
        _ => KOREAN_GREETING,
    };
    ChatLine {
        sender: Sender::Medi,
        message: message.to_string(),
        korean_message: KOREAN_GREETING.to_string(),
    }
}

/// First message of a chat room opened from a stored record.
pub struct ChatSeed;

impl ChatSeed {
    pub fn from_record(record: &NormalizedRecord) -> ChatLine {
        ChatLine {
            sender: Sender::User,
            message: record.content.clone(),
            korean_message: record.korean_content.clone(),
        }
    }
}
