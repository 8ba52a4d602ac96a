//! Error types for dispatched resource operations
//!
//! Every failure a dispatched operation can report, with the HTTP status and
//! stable error code it is rendered with.

use serde_json::Value;
use thiserror::Error;

use resource_acl::{AccessError, Operation};
use resource_query::QueryError;
use resource_store::{Record, StoreError};

/// Resource layer error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    /// No resource kind registered under this name
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    /// The kind's access policy does not enable the operation
    #[error("Operation {operation} is not allowed on {kind}")]
    OperationNotAllowed {
        /// Resource kind
        kind: String,
        /// Requested operation
        operation: Operation,
    },

    /// Missing id or undecodable payload
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Filter builder or compile failure
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The identity holds none of the required roles
    #[error("Forbidden: insufficient permissions")]
    PermissionDenied,

    /// An update to a revisioned kind carried no revision
    #[error("revision is required")]
    RevisionRequired,

    /// An update carried a stale revision
    #[error("conflict")]
    RevisionConflict {
        /// The resource as currently stored
        current: Box<Record>,
    },

    /// A record with the same id already exists
    #[error("{kind} already exists: {id}")]
    Duplicate {
        /// Resource kind
        kind: String,
        /// Conflicting id
        id: String,
    },

    /// No record with the given id
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Requested id
        id: String,
    },

    /// Opaque backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The request deadline passed before the operation finished
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

/// Result type for resource layer operations.
pub type LayerResult<T> = Result<T, LayerError>;

impl LayerError {
    /// Check if this error should be logged at error level.
    ///
    /// Client mistakes and denied access are expected and are not.
    pub fn is_server_error(&self) -> bool {
        matches!(self, LayerError::Storage(_) | LayerError::DeadlineExceeded)
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            LayerError::BadRequest(_) | LayerError::Query(_) => 400,
            LayerError::PermissionDenied => 403,
            LayerError::UnknownKind(_) | LayerError::NotFound { .. } => 404,
            LayerError::OperationNotAllowed { .. } => 405,
            LayerError::RevisionRequired
            | LayerError::RevisionConflict { .. }
            | LayerError::Duplicate { .. } => 409,
            LayerError::Storage(_) => 500,
            LayerError::DeadlineExceeded => 504,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            LayerError::UnknownKind(_) => "UNKNOWN_KIND",
            LayerError::OperationNotAllowed { .. } => "OPERATION_NOT_ALLOWED",
            LayerError::BadRequest(_) => "BAD_REQUEST",
            LayerError::Query(e) => e.error_code(),
            LayerError::PermissionDenied => "FORBIDDEN",
            LayerError::RevisionRequired => "REVISION_REQUIRED",
            LayerError::RevisionConflict { .. } => "REVISION_CONFLICT",
            LayerError::Duplicate { .. } => "DUPLICATE",
            LayerError::NotFound { .. } => "NOT_FOUND",
            LayerError::Storage(_) => "STORAGE_ERROR",
            LayerError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    /// Data returned alongside the error: the stored resource on a conflict.
    pub fn data(&self) -> Option<Value> {
        match self {
            LayerError::RevisionConflict { current } => serde_json::to_value(current.as_ref()).ok(),
            _ => None,
        }
    }

    /// Map an access failure. A revision conflict reports `current`.
    pub fn from_access(error: AccessError, current: &Record) -> Self {
        match error {
            AccessError::PermissionDenied => LayerError::PermissionDenied,
            AccessError::RevisionRequired => LayerError::RevisionRequired,
            AccessError::RevisionConflict { .. } => LayerError::RevisionConflict {
                current: Box::new(current.clone()),
            },
        }
    }
}

impl From<StoreError> for LayerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { kind, id } => LayerError::NotFound { kind, id },
            StoreError::Duplicate { kind, id } => LayerError::Duplicate { kind, id },
            StoreError::RevisionMismatch { current } => LayerError::RevisionConflict { current },
            StoreError::UnknownRelation(name) => LayerError::BadRequest(format!("Unknown relation: {}", name)),
            StoreError::Backend(message) => LayerError::Storage(message),
        }
    }
}
