//! Error types for the integrator core.

use crate::types::SourceId;

/// Errors that can occur while editing sources, mappings, or generating code.
#[derive(thiserror::Error, Debug)]
pub enum IntegratorError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Source not found: {0}")]
    SourceNotFound(SourceId),

    #[error("Invalid mapping key: {0}")]
    InvalidMappingKey(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntegratorError {
    /// Whether this error is a user-facing validation failure (no mutation happened).
    pub fn is_validation(&self) -> bool {
        matches!(self, IntegratorError::Validation(_))
    }
}

/// Convenience result type.
pub type IntegratorResult<T> = Result<T, IntegratorError>;
