//! Error types for Rivet.
//!
//! Library crates use [`RivetError`] via `thiserror`. The routing path
//! converts every internal failure into a degraded-but-valid response;
//! only validation errors reach the caller of `route_query`.

/// Top-level error type for all Rivet operations.
#[derive(Debug, thiserror::Error)]
pub enum RivetError {
    /// Malformed input (empty query, oversized payload, bad URL).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Fingerprint store or other database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network/HTTP error while talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// The knowledge-base store is unreachable or timed out.
    /// Degraded to `KbCoverage::None` by the coverage evaluator.
    #[error("coverage evaluation unavailable: {0}")]
    CoverageUnavailable(String),

    /// SME agent dispatch failed or timed out.
    /// Caught by the router, which falls back to the LLM answer.
    #[error("SME agent failure: {0}")]
    SmeAgent(String),

    /// A single research source failed to resolve or fetch.
    /// Isolated per source, never aborts the batch.
    #[error("scrape failure: {0}")]
    Scrape(String),

    /// Background ingestion of a reserved source failed.
    /// The fingerprint is left incomplete for TTL-based retry.
    #[error("ingestion failure: {0}")]
    Ingestion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RivetError>;

impl RivetError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RivetError::validation("query must not be empty");
        assert_eq!(err.to_string(), "validation error: query must not be empty");

        let err = RivetError::CoverageUnavailable("kb store timed out".into());
        assert!(err.to_string().contains("kb store timed out"));
    }
}
