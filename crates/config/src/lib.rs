//! Configuration loading, validation, and management for Slotflow.
//!
//! Loads configuration from `~/.slotflow/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.slotflow/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature for conversational replies
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Intent routing
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Field-group collectors
    #[serde(default)]
    pub collectors: CollectorsConfig,

    /// How field values are pulled out of user input
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Document ingestion
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Summarizer
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("routing", &self.routing)
            .field("collectors", &self.collectors)
            .field("extraction", &self.extraction)
            .field("documents", &self.documents)
            .field("summary", &self.summary)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Number of past turns shown to the classifier
    #[serde(default = "default_routing_window")]
    pub history_window: usize,

    #[serde(default)]
    pub classify_temperature: f32,

    /// Reply with a list of collectable data when no handler applies
    #[serde(default = "default_true")]
    pub fallback_reply: bool,
}

fn default_routing_window() -> usize {
    5
}
fn default_true() -> bool {
    true
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            history_window: default_routing_window(),
            classify_temperature: 0.0,
            fallback_reply: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorsConfig {
    #[serde(default = "default_collector_window")]
    pub history_window: usize,
}

fn default_collector_window() -> usize {
    10
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            history_window: default_collector_window(),
        }
    }
}

/// Field extraction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// `field = value` style mentions only
    Pattern,
    /// Ask the completion service for structured output
    Completion,
    /// Pattern first, completion for whatever is still missing
    #[default]
    Hybrid,
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExtractionStrategy::Pattern => "pattern",
            ExtractionStrategy::Completion => "completion",
            ExtractionStrategy::Hybrid => "hybrid",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub strategy: ExtractionStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Directory searched for bare file names
    #[serde(default = "default_documents_dir")]
    pub base_dir: PathBuf,

    /// Extension that marks a token as a document reference
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./pdfs")
}
fn default_extension() -> String {
    "pdf".into()
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_documents_dir(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_window")]
    pub history_window: usize,

    /// Maximum characters of document text quoted in the digest
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

fn default_summary_window() -> usize {
    20
}
fn default_excerpt_chars() -> usize {
    2000
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            history_window: default_summary_window(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.slotflow/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `SLOTFLOW_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = env("SLOTFLOW_API_KEY")
                .or_else(|| env("OPENROUTER_API_KEY"))
                .or_else(|| env("OPENAI_API_KEY"));
        }

        if let Some(provider) = env("SLOTFLOW_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = env("SLOTFLOW_MODEL") {
            self.default_model = model;
        }

        if let Some(dir) = env("SLOTFLOW_DOCUMENTS_DIR") {
            self.documents.base_dir = PathBuf::from(dir);
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".slotflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.routing.classify_temperature) {
            return Err(ConfigError::ValidationError(
                "routing.classify_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let windows = [
            ("routing.history_window", self.routing.history_window),
            ("collectors.history_window", self.collectors.history_window),
            ("summary.history_window", self.summary.history_window),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
            }
        }

        if self.documents.extension.trim_start_matches('.').trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "documents.extension must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if the default provider has an API key, either its own
    /// `[providers.<name>]` key or the top-level one.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .default_provider_config()
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Model used for the default provider. A `[providers.<name>]`
    /// `default_model` takes precedence over the top-level one.
    pub fn effective_model(&self) -> &str {
        self.default_provider_config()
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    fn default_provider_config(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.default_provider)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            routing: RoutingConfig::default(),
            collectors: CollectorsConfig::default(),
            extraction: ExtractionConfig::default(),
            documents: DocumentsConfig::default(),
            summary: SummaryConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
