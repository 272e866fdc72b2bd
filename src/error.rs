//! Error types for memory search and cache operations
//!
//! Cache-side failures are usually absorbed by the adaptive cache and only
//! surface through logs and the error metric. Back-end failures propagate to
//! the caller of a search.

use thiserror::Error;

/// Main error type for weave-memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Cache store or retrieval back end unreachable
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// External call exceeded its deadline
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    TimeoutError { timeout_ms: u64, context: String },

    /// A back end rejected or failed to execute a query
    #[error("Query error: {0}")]
    QueryError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Neo4rs driver error (wrapper)
    #[error("Neo4rs driver error: {0}")]
    DriverError(#[from] neo4rs::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for weave-memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

impl MemoryError {
    /// Build a timeout error from the deadline that was exceeded
    pub fn timeout(deadline: std::time::Duration, context: impl Into<String>) -> Self {
        MemoryError::TimeoutError {
            timeout_ms: deadline.as_millis() as u64,
            context: context.into(),
        }
    }

    /// Whether the error means the remote side could not be reached in time
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MemoryError::ConnectionError(_) | MemoryError::TimeoutError { .. }
        )
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::SerializationError(e.to_string())
    }
}

impl From<String> for MemoryError {
    fn from(s: String) -> Self {
        MemoryError::Other(s)
    }
}

impl From<&str> for MemoryError {
    fn from(s: &str) -> Self {
        MemoryError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let error = MemoryError::ConnectionError("cache unreachable".to_string());
        assert_eq!(error.to_string(), "Connection error: cache unreachable");

        let timeout_error = MemoryError::timeout(Duration::from_millis(250), "structural search");
        assert!(timeout_error.to_string().contains("timed out after 250ms"));
        assert!(timeout_error.to_string().contains("structural search"));
    }

    #[test]
    fn test_error_conversion() {
        let error: MemoryError = "test error".into();
        assert!(matches!(error, MemoryError::Other(_)));

        let error: MemoryError = "test error".to_string().into();
        assert!(matches!(error, MemoryError::Other(_)));

        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: MemoryError = bad.into();
        assert!(matches!(error, MemoryError::SerializationError(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(MemoryError::ConnectionError("x".into()).is_transient());
        assert!(MemoryError::timeout(Duration::from_secs(1), "x").is_transient());
        assert!(!MemoryError::QueryError("x".into()).is_transient());
    }
}
