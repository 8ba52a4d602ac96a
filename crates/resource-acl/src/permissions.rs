//! # Permissions
//!
//! Role sets and the per-record permission that names which roles may read
//! or write a resource instance. An empty role set means unrestricted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of access being requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Read access (single-record reads and query results).
    Read,
    /// Write access (updates and deletes).
    Write,
}

impl Access {
    /// Get the string representation of the access kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

/// An ordered set of opaque role labels (e.g. `"admin"`, `"user:42"`).
///
/// Serializes as a JSON array. Deserializes from either a JSON array or the
/// legacy JSON-encoded string form (`"[\"admin\", \"ceo\"]"`), so the string
/// is parsed once at load time and never again per check.
///
/// # Example
///
/// ```
/// use resource_acl::permissions::RoleSet;
///
/// let roles = RoleSet::from_iter(["admin", "ceo"]);
/// assert!(roles.contains("admin"));
/// assert_eq!(roles.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RoleSetRepr", into = "Vec<String>")]
pub struct RoleSet {
    roles: BTreeSet<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleSetRepr {
    List(Vec<String>),
    Encoded(String),
}

impl TryFrom<RoleSetRepr> for RoleSet {
    type Error = String;

    fn try_from(repr: RoleSetRepr) -> Result<Self, Self::Error> {
        match repr {
            RoleSetRepr::List(roles) => Ok(roles.into_iter().collect()),
            RoleSetRepr::Encoded(s) => RoleSet::decode(&s),
        }
    }
}

impl From<RoleSet> for Vec<String> {
    fn from(set: RoleSet) -> Self {
        set.roles.into_iter().collect()
    }
}

impl RoleSet {
    /// Create an empty role set.
    pub fn new() -> Self {
        Self {
            roles: BTreeSet::new(),
        }
    }

    /// Decode the legacy JSON-string role list. Blank input is an empty set.
    ///
    /// # Example
    ///
    /// ```
    /// use resource_acl::permissions::RoleSet;
    ///
    /// let roles = RoleSet::decode(r#"["admin", "ceo"]"#).unwrap();
    /// assert!(roles.contains("ceo"));
    /// assert!(RoleSet::decode("").unwrap().is_empty());
    /// assert!(RoleSet::decode("admin").is_err());
    /// ```
    pub fn decode(s: &str) -> Result<Self, String> {
        if s.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str::<Vec<String>>(s)
            .map(|roles| roles.into_iter().collect())
            .map_err(|e| format!("invalid role list: {}", e))
    }

    /// Add a role.
    pub fn insert(&mut self, role: impl Into<String>) -> bool {
        self.roles.insert(role.into())
    }

    /// Remove a role.
    pub fn remove(&mut self, role: &str) -> bool {
        self.roles.remove(role)
    }

    /// Check whether a role is present.
    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Check whether the two sets share at least one role.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        // Iterate the smaller set.
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.roles.iter().any(|role| large.roles.contains(role))
    }

    /// Iterate roles in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    /// Get the count of roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            roles: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Roles required to read or write a resource instance.
///
/// Attached to a record, or declared as the default for a kind. When neither
/// is present the resource is unrestricted.
///
/// # Example
///
/// ```
/// use resource_acl::permissions::{Access, Permission, RoleSet};
///
/// let perm = Permission::new(RoleSet::from_iter(["admin"]), RoleSet::new());
/// assert_eq!(perm.required(Access::Read).len(), 1);
/// assert!(perm.required(Access::Write).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Roles allowed to read; empty means anyone.
    #[serde(default)]
    pub read: RoleSet,
    /// Roles allowed to write; empty means anyone.
    #[serde(default)]
    pub write: RoleSet,
}

impl Permission {
    /// Create a permission from read and write role sets.
    pub fn new(read: RoleSet, write: RoleSet) -> Self {
        Self { read, write }
    }

    /// A permission that lets anyone read and write.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// A permission requiring the same roles for reads and writes.
    pub fn restricted_to<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: RoleSet = roles.into_iter().collect();
        Self {
            read: roles.clone(),
            write: roles,
        }
    }

    /// Role set required for the given access.
    pub fn required(&self, access: Access) -> &RoleSet {
        match access {
            Access::Read => &self.read,
            Access::Write => &self.write,
        }
    }

    /// Whether neither reads nor writes are restricted.
    pub fn is_unrestricted(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}
