use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical language used for table lookups, prompt wording and section fences.
///
/// Distinct from the free-form language strings callers submit
/// ("english", "ZH", "ko-KR"); see `pipeline::content::LanguageNormalizer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "ja")]
    Japanese,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Chinese,
        Language::Korean,
        Language::Japanese,
    ];

    /// ISO 639-1 tag.
    pub fn tag(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
            Language::Korean => "ko",
            Language::Japanese => "ja",
        }
    }

    /// Uppercase tag embedded in section fences (`<<<BEGIN_EN>>>`).
    pub fn fence_tag(self) -> &'static str {
        match self {
            Language::English => "EN",
            Language::Chinese => "ZH",
            Language::Korean => "KO",
            Language::Japanese => "JA",
        }
    }

    /// English name, used inside prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Chinese => "Chinese",
            Language::Korean => "Korean",
            Language::Japanese => "Japanese",
        }
    }

    /// Resolve a full English word or ISO code, ignoring case and region
    /// subtags. Returns `None` for anything unrecognised.
    pub fn from_identifier(input: &str) -> Option<Self> {
        let lower = input.trim().to_ascii_lowercase();
        let primary = lower.split(['-', '_']).next().unwrap_or_default();
        match primary {
            "en" | "eng" | "english" => Some(Language::English),
            "zh" | "zho" | "chi" | "chinese" => Some(Language::Chinese),
            "ko" | "kor" | "korean" => Some(Language::Korean),
            "ja" | "jpn" | "japanese" => Some(Language::Japanese),
            _ => None,
        }
    }

    pub fn is_korean(self) -> bool {
        self == Language::Korean
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_and_codes_resolve() {
        assert_eq!(Language::from_identifier("ENGLISH"), Some(Language::English));
        assert_eq!(Language::from_identifier("chinese"), Some(Language::Chinese));
        assert_eq!(Language::from_identifier("ko"), Some(Language::Korean));
        assert_eq!(Language::from_identifier("zh-CN"), Some(Language::Chinese));
        assert_eq!(Language::from_identifier("ko_KR"), Some(Language::Korean));
    }

    #[test]
    fn unknown_and_blank_are_none() {
        assert_eq!(Language::from_identifier("xx"), None);
        assert_eq!(Language::from_identifier(""), None);
        assert_eq!(Language::from_identifier("   "), None);
    }

    #[test]
    fn serializes_as_iso_tag() {
        assert_eq!(serde_json::to_string(&Language::Korean).unwrap(), "\"ko\"");
        let lang: Language = serde_json::from_str("\"zh\"").unwrap();
        assert_eq!(lang, Language::Chinese);
    }

    #[test]
    fn fence_tags_are_uppercase_codes() {
        for lang in Language::ALL {
            assert_eq!(lang.fence_tag(), lang.tag().to_ascii_uppercase());
        }
    }
}
