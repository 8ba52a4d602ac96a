//! Error types for building and compiling filter expressions.

use thiserror::Error;

/// Filter builder and compiler errors.
///
/// `NoKey` and `NoValue` come from misuse of the fluent builder (or an
/// equivalent malformed structured tree). The remaining variants are raised by
/// compilation. All of them are detected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// An item has no column key selected.
    #[error("no query key selected")]
    NoKey,

    /// An item has no comparison value selected.
    #[error("no query value selected")]
    NoValue,

    /// The operator is not in the whitelist.
    #[error("Invalid SQL operator: {0}")]
    InvalidOperator(String),

    /// The column does not exist on the target resource.
    #[error("Column does not exist: {0}")]
    UnknownColumn(String),

    /// An order-by entry could not be parsed.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The structured expression could not be decoded.
    #[error("Malformed filter expression: {0}")]
    Malformed(String),
}

/// Result type for filter operations.
pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    /// Whether the error comes from fluent-builder misuse.
    pub fn is_builder_error(&self) -> bool {
        matches!(self, QueryError::NoKey | QueryError::NoValue)
    }

    /// Whether the error comes from compilation.
    pub fn is_compile_error(&self) -> bool {
        !self.is_builder_error()
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::NoKey => "NO_KEY",
            QueryError::NoValue => "NO_VALUE",
            QueryError::InvalidOperator(_) => "INVALID_OPERATOR",
            QueryError::UnknownColumn(_) => "UNKNOWN_COLUMN",
            QueryError::InvalidOrder(_) => "INVALID_ORDER",
            QueryError::Malformed(_) => "MALFORMED_FILTER",
        }
    }
}
