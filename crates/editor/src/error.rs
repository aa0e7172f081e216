//! Error types for request processing
//!
//! Configuration errors describe integrator mistakes and always propagate.
//! Storage and protocol errors may be folded into the response when the
//! editor runs with contained errors.

use tabula_query::QueryError;
use thiserror::Error;

use crate::path::PathError;

/// Result type alias for editor operations
pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Debug, Clone, Error)]
pub enum EditorError {
    /// Malformed join, field or primary key setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Path(#[from] PathError),

    /// Request names an action outside the protocol
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Request is well formed JSON but violates the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

impl EditorError {
    pub fn config(message: impl Into<String>) -> Self {
        EditorError::Configuration(message.into())
    }

    /// Configuration errors are never folded into a response
    pub fn is_configuration(&self) -> bool {
        matches!(self, EditorError::Configuration(_) | EditorError::Path(_))
    }
}
