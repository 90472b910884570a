//! Domain-specific error types for the investigation engine

use thiserror::Error;

/// Main error type for investigation orchestration
#[derive(Error, Debug)]
pub enum InvestigationError {
    #[error("Investigation not found: {id}")]
    NotFound { id: String },

    #[error("Investigation result not found: {id}")]
    ResultNotFound { id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Required query {query_id} failed: {message}")]
    RequiredQueryFailed { query_id: String, message: String },

    #[error("Query {query_id} failed: {message}")]
    QueryFailed { query_id: String, message: String },

    #[error("AI provider error: {message}")]
    AiProvider { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Investigation {id} is paused; resume it before continuing")]
    Paused { id: String },

    #[error("Investigation {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl InvestigationError {
    /// True for lookups of unknown ids, the only errors callers should never retry.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InvestigationError::NotFound { .. } | InvestigationError::ResultNotFound { .. }
        )
    }
}

impl From<anyhow::Error> for InvestigationError {
    fn from(err: anyhow::Error) -> Self {
        InvestigationError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for InvestigationError {
    fn from(err: serde_json::Error) -> Self {
        InvestigationError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for InvestigationError {
    fn from(err: toml::de::Error) -> Self {
        InvestigationError::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for investigation operations
pub type Result<T> = std::result::Result<T, InvestigationError>;
