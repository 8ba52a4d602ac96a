//! Error types for backing store operations.

use thiserror::Error;

use crate::record::Record;

/// Store error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No record with the given id.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Requested id.
        id: String,
    },

    /// A record with the same id already exists.
    #[error("{kind} already exists: {id}")]
    Duplicate {
        /// Resource kind.
        kind: String,
        /// Conflicting id.
        id: String,
    },

    /// A conditional update found a different stored revision.
    #[error("Revision mismatch: stored revision is {}", current.revision)]
    RevisionMismatch {
        /// The record as currently stored.
        current: Box<Record>,
    },

    /// An include named a relation the kind does not declare.
    #[error("Unknown relation: {0}")]
    UnknownRelation(String),

    /// Opaque failure from the backend.
    #[error("Storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Whether this error means the record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
