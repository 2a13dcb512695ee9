//! Error taxonomy
//!
//! Every error surfaced to a caller carries a stable machine-readable code
//! next to the human message, so front-ends can branch without string
//! matching.

use std::collections::BTreeMap;

/// Engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Decision id does not exist
    #[error("Decision not found: {0}")]
    NotFound(String),
    /// Link id does not exist
    #[error("Link not found: {0}")]
    LinkNotFound(i64),
    /// Missing/empty required field, out-of-range confidence, illegal value
    #[error("{message}")]
    Validation {
        /// Human-readable description of what failed validation
        message: String,
        /// Field-level details, when available
        details: Option<BTreeMap<String, String>>,
    },
    /// Open/migrate/prepare/execute failure in the storage layer
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Model load failed permanently, or dimension mismatch
    #[error("Embedding error: {0}")]
    Embedding(String),
    /// Malformed configuration (logged and defaulted, fatal only on misuse)
    #[error("Configuration error: {0}")]
    Config(String),
    /// Vector search capability is not available in this process
    #[error("Vector search unavailable")]
    VectorUnavailable,
    /// End-to-end budget exceeded on the context-injection path
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),
    /// Engine used before `init()` completed
    #[error("Memory engine is not initialized")]
    NotInitialized,
    /// IO error (database directory creation, config file access)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invariant violation that should never surface in normal operation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Stable structured code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            MemoryError::NotFound(_) => "DECISION_NOT_FOUND",
            MemoryError::LinkNotFound(_) => "LINK_NOT_FOUND",
            MemoryError::Validation { .. } => "INVALID_INPUT",
            MemoryError::Database(_) => "DATABASE_ERROR",
            MemoryError::Embedding(_) => "EMBEDDING_ERROR",
            MemoryError::Config(_) => "CONFIG_ERROR",
            MemoryError::VectorUnavailable => "VECTOR_SEARCH_UNAVAILABLE",
            MemoryError::Timeout(_) => "TIMEOUT",
            MemoryError::NotInitialized => "NOT_INITIALIZED",
            MemoryError::Io(_) => "IO_ERROR",
            MemoryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Shorthand for a validation error without field details.
    pub fn validation(message: impl Into<String>) -> Self {
        MemoryError::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Validation error with a single field detail.
    pub fn validation_field(
        message: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let mut details = BTreeMap::new();
        details.insert(field.into(), detail.into());
        MemoryError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Engine result type
pub type Result<T> = std::result::Result<T, MemoryError>;
