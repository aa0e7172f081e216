//! Error types for query building and execution
//!
//! Every backend reports failures through [`QueryError`] so callers can
//! treat PostgreSQL and in-memory execution uniformly.

use thiserror::Error;

/// Result type alias for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Error types for query operations
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Database connection or statement error
    #[error("Database error: {0}")]
    Database(String),

    /// The query could not be built or is malformed
    #[error("Query error: {0}")]
    Query(String),

    /// Transaction could not be started, committed or rolled back
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Row data could not be converted
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backend does not support the requested construct
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::Unsupported("raw select".to_string());
        assert_eq!(err.to_string(), "Unsupported operation: raw select");

        let err = QueryError::Transaction("already closed".to_string());
        assert_eq!(err.to_string(), "Transaction error: already closed");
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: QueryError = parse_err.into();
        assert!(matches!(err, QueryError::Serialization(_)));
    }
}
