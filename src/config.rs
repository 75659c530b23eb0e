use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Language;

/// Application-level constants
pub const APP_NAME: &str = "MediMate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_UPSTAGE_BASE_URL: &str = "https://api.upstage.ai";
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EXTRACTION_MODEL: &str = "information-extract";

/// Korea Standard Time. Record dates are clinic-local dates.
const DEFAULT_CLINIC_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,medimate_lib=debug,medimate=debug,reqwest=warn,hyper=warn"
}

/// Get the default database location (./medimate.db unless overridden)
pub fn default_database_path() -> PathBuf {
    PathBuf::from("medimate.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// How the intake narrative is turned into record content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// Record content is the AI-authored symptom paragraph.
    #[default]
    AiNarrative,
    /// Record content is a server-rendered label sheet whose symptom line
    /// carries the AI paragraph.
    LabelSheet,
}

impl CompositionMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ai_narrative" | "narrative" => Some(Self::AiNarrative),
            "label_sheet" | "labels" => Some(Self::LabelSheet),
            _ => None,
        }
    }
}

/// Connection settings for one chat-completions style service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Extra headers sent with every request (e.g. OpenAI-Organization).
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
}

impl ServiceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pipeline behaviour switches that are policy rather than plumbing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub default_language: Language,
    /// Temperature for the intake translation/summary call.
    pub intake_temperature: f32,
    /// When false the free-text description is withheld from the
    /// generation service and from server-composed content.
    pub include_description: bool,
    pub composition: CompositionMode,
    pub clinic_utc_offset_secs: i32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_language: Language::English,
            intake_temperature: 0.7,
            include_description: true,
            composition: CompositionMode::AiNarrative,
            clinic_utc_offset_secs: DEFAULT_CLINIC_UTC_OFFSET_SECS,
        }
    }
}

impl PipelineSettings {
    /// Out-of-range offsets fall back to UTC.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

/// Full runtime configuration, read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub generation: ServiceConfig,
    pub extraction: ServiceConfig,
    pub pipeline: PipelineSettings,
    pub database_path: PathBuf,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let openai_key = var("OPENAI_API_KEY").ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;
        let upstage_key = var("UPSTAGE_API_KEY").ok_or(ConfigError::MissingVar("UPSTAGE_API_KEY"))?;

        let connect_timeout_secs = parse_or("MEDIMATE_CONNECT_TIMEOUT_SECS", var("MEDIMATE_CONNECT_TIMEOUT_SECS"), 5)?;

        let mut extra_headers = Vec::new();
        if let Some(org) = var("OPENAI_ORG_ID") {
            extra_headers.push(("OpenAI-Organization".to_string(), org));
        }
        if let Some(project) = var("OPENAI_PROJECT_ID") {
            extra_headers.push(("OpenAI-Project".to_string(), project));
        }

        let generation = ServiceConfig {
            base_url: var("MEDIMATE_OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            api_key: openai_key,
            model: var("MEDIMATE_GENERATION_MODEL").unwrap_or_else(|| DEFAULT_GENERATION_MODEL.into()),
            connect_timeout_secs,
            request_timeout_secs: parse_or(
                "MEDIMATE_GENERATION_TIMEOUT_SECS",
                var("MEDIMATE_GENERATION_TIMEOUT_SECS"),
                60,
            )?,
            extra_headers,
        };

        let extraction = ServiceConfig {
            base_url: var("MEDIMATE_UPSTAGE_BASE_URL").unwrap_or_else(|| DEFAULT_UPSTAGE_BASE_URL.into()),
            api_key: upstage_key,
            model: var("MEDIMATE_EXTRACTION_MODEL").unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.into()),
            connect_timeout_secs,
            request_timeout_secs: parse_or(
                "MEDIMATE_EXTRACTION_TIMEOUT_SECS",
                var("MEDIMATE_EXTRACTION_TIMEOUT_SECS"),
                60,
            )?,
            extra_headers: Vec::new(),
        };

        let defaults = PipelineSettings::default();
        let default_language = match var("MEDIMATE_DEFAULT_LANGUAGE") {
            Some(raw) => Language::from_identifier(&raw).ok_or(ConfigError::InvalidValue {
                name: "MEDIMATE_DEFAULT_LANGUAGE",
                value: raw,
            })?,
            None => defaults.default_language,
        };
        let composition = match var("MEDIMATE_COMPOSITION") {
            Some(raw) => CompositionMode::parse(&raw).ok_or(ConfigError::InvalidValue {
                name: "MEDIMATE_COMPOSITION",
                value: raw,
            })?,
            None => defaults.composition,
        };

        let pipeline = PipelineSettings {
            default_language,
            intake_temperature: parse_or(
                "MEDIMATE_INTAKE_TEMPERATURE",
                var("MEDIMATE_INTAKE_TEMPERATURE"),
                defaults.intake_temperature,
            )?,
            include_description: parse_or(
                "MEDIMATE_INCLUDE_DESCRIPTION",
                var("MEDIMATE_INCLUDE_DESCRIPTION"),
                defaults.include_description,
            )?,
            composition,
            clinic_utc_offset_secs: parse_or(
                "MEDIMATE_CLINIC_UTC_OFFSET_SECS",
                var("MEDIMATE_CLINIC_UTC_OFFSET_SECS"),
                defaults.clinic_utc_offset_secs,
            )?,
        };

        Ok(Self {
            generation,
            extraction,
            pipeline,
            database_path: var("MEDIMATE_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
