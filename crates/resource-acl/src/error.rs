//! Error types for permission and revision checks.

use thiserror::Error;

/// Access evaluation errors.
///
/// `RevisionConflict` carries no payload here; callers that hold the current
/// stored resource attach it when reporting the conflict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The identity holds none of the required roles.
    #[error("Forbidden: insufficient permissions")]
    PermissionDenied,

    /// An update to a revisioned resource did not carry a revision.
    #[error("Revision is required")]
    RevisionRequired,

    /// The submitted revision does not match the stored one.
    #[error("Revision conflict: submitted {submitted}, current {current}")]
    RevisionConflict {
        /// Revision carried by the proposed update.
        submitted: i64,
        /// Revision currently stored.
        current: i64,
    },
}

/// Result type for access checks.
pub type AccessResult<T> = Result<T, AccessError>;
