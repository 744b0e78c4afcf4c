use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language (ISO code such as "en", or a language name)
    pub source_language: String,

    /// Target language (ISO code such as "vi", or a language name)
    pub target_language: String,

    /// Directory receiving checkpoints and translated documents
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// What to do when some segments have no translation at injection time
    #[serde(default)]
    pub injection: InjectionPolicy,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    // @field: Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Chat-completions base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    // @field: Character budget of one chunk
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    // @field: Chunks in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    // @field: Per-call timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count for failed chunks (attempts after the first one)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl TranslationConfig {
    /// Per-call timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a credential is configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            max_chunk_size: default_max_chunk_size(),
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Policy applied by the injector when translations are missing
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InjectionPolicy {
    /// Refuse to write output unless every segment is done
    #[default]
    Strict,
    /// Write output, keeping the source text where a translation is missing
    BestEffort,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching filter for the `log` facade
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_chunk_size() -> usize {
    5000
}

fn default_max_concurrent() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3 // Default to 3 retries
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_temperature() -> f32 {
    0.3
}

fn default_system_prompt() -> String {
    "You are a professional translator. Translate every entry from {source_language} to {target_language}. \
Each entry starts with a marker line such as <<ENTRY_0>> and the batch ends with a marker such as <<END>>. \
Return every marker unchanged and in the same order, each followed by the translation of its entry only. \
Preserve punctuation, numbers and surrounding whitespace. Do not add commentary."
        .to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.translation.has_api_key() {
            return Err(ConfigError::MissingApiKey);
        }

        if self.source_language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source_language",
                reason: "must not be empty".to_string(),
            });
        }

        if self.target_language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "target_language",
                reason: "must not be empty".to_string(),
            });
        }

        if self.translation.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "model",
                reason: "must not be empty".to_string(),
            });
        }

        if self.translation.max_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_chunk_size",
                reason: "must be at least 1 character".to_string(),
            });
        }

        if self.translation.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.translation.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.translation.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature",
                reason: format!("{} is outside 0.0..=2.0", self.translation.temperature),
            });
        }

        Url::parse(&self.translation.endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(self.translation.endpoint.clone()))?;

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "vi".to_string(),
            output_dir: default_output_dir(),
            translation: TranslationConfig::default(),
            injection: InjectionPolicy::default(),
            log_level: LogLevel::default(),
        }
    }
}
