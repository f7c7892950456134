//! Error types for the Slotflow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` aggregates them.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Slotflow operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Schema errors ---
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    // --- Routing errors ---
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    // --- Completion errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Ingestion errors ---
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport-level failures talking to an LLM backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Unknown collector: '{0}'")]
    UnknownCollector(String),
}

/// The router could not produce a decision from the classification it got back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("Classification named an unknown target '{0}'")]
    InvalidTarget(String),

    #[error("Classification confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("Classification is missing or mistyped field '{0}'")]
    Malformed(String),

    #[error("Classification could not be parsed: {0}")]
    Unparsable(String),
}

/// The text completion port failed.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed structured output: {reason}")]
    Parse { reason: String, raw: String },
}

impl CompletionError {
    pub fn parse(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("Document '{reference}' not found (also looked in {base_dir})")]
    NotFound { reference: String, base_dir: PathBuf },

    #[error("Failed to extract text from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}

/// Field extraction failed. Collectors treat this as "nothing extracted".
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Extraction call failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Extraction output rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn not_found_mentions_base_dir() {
        let err = IngestError::NotFound {
            reference: "report.pdf".into(),
            base_dir: PathBuf::from("./pdfs"),
        };
        let text = err.to_string();
        assert!(text.contains("report.pdf"));
        assert!(text.contains("./pdfs"));
    }

    #[test]
    fn completion_error_wraps_provider_error() {
        let err: CompletionError = ProviderError::Network("connection reset".into()).into();
        assert!(err.to_string().contains("connection reset"));
        let err: Error = err.into();
        assert!(matches!(err, Error::Completion(CompletionError::Provider(_))));
    }
}
