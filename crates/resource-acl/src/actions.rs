//! # Operations
//!
//! Defines the operations a dispatcher can route to a resource kind and the
//! per-kind access policy that enables or disables each of them.

use serde::{Deserialize, Serialize};

/// Operations that can be dispatched against a resource kind.
///
/// - **Create**: Insert a new record
/// - **Read**: Fetch a single record by id
/// - **Update**: Modify an existing record
/// - **Delete**: Remove a record
/// - **Query**: Run a filter expression over the kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Insert a new record.
    Create,

    /// Fetch a single record by id.
    Read,

    /// Modify an existing record.
    Update,

    /// Remove a record.
    Delete,

    /// Run a filter expression over the kind.
    Query,
}

impl Operation {
    /// Get the string representation of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Query => "query",
        }
    }

    /// Parse an operation from its name or the HTTP verb that maps to it.
    ///
    /// # Example
    ///
    /// ```
    /// use resource_acl::actions::Operation;
    ///
    /// assert_eq!(Operation::parse("read"), Some(Operation::Read));
    /// assert_eq!(Operation::parse("PUT"), Some(Operation::Update));
    /// assert_eq!(Operation::parse("head"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" | "post" => Some(Operation::Create),
            "read" | "get" => Some(Operation::Read),
            "update" | "put" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            "query" => Some(Operation::Query),
            _ => None,
        }
    }

    /// Get all operations.
    pub fn all() -> &'static [Operation] {
        &[
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
            Operation::Query,
        ]
    }

    /// Whether the operation mutates stored state.
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which operations are enabled for a resource kind.
///
/// Registered once per kind before serving begins. A disabled operation is
/// rejected by the dispatcher before any store access.
///
/// # Example
///
/// ```
/// use resource_acl::actions::{AccessPolicy, Operation};
///
/// let policy = AccessPolicy::read_only().with(Operation::Query, true);
/// assert!(policy.allows(Operation::Read));
/// assert!(policy.allows(Operation::Query));
/// assert!(!policy.allows(Operation::Delete));
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Records may be created.
    #[serde(default)]
    pub create: bool,
    /// Records may be read by id.
    #[serde(default)]
    pub read: bool,
    /// Records may be updated.
    #[serde(default)]
    pub update: bool,
    /// Records may be deleted.
    #[serde(default)]
    pub delete: bool,
    /// The kind may be queried with filter expressions.
    #[serde(default)]
    pub query: bool,
}

impl AccessPolicy {
    /// Policy with every operation enabled.
    pub fn all() -> Self {
        Self {
            create: true,
            read: true,
            update: true,
            delete: true,
            query: true,
        }
    }

    /// Policy with every operation disabled.
    pub fn none() -> Self {
        Self::default()
    }

    /// Policy allowing only single-record reads.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Enable or disable one operation.
    pub fn with(mut self, operation: Operation, enabled: bool) -> Self {
        match operation {
            Operation::Create => self.create = enabled,
            Operation::Read => self.read = enabled,
            Operation::Update => self.update = enabled,
            Operation::Delete => self.delete = enabled,
            Operation::Query => self.query = enabled,
        }
        self
    }

    /// Check whether an operation is enabled.
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
            Operation::Query => self.query,
        }
    }

    /// Operations currently enabled, in declaration order.
    pub fn enabled(&self) -> Vec<Operation> {
        Operation::all()
            .iter()
            .copied()
            .filter(|op| self.allows(*op))
            .collect()
    }
}
