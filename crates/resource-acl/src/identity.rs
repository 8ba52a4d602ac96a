//! Acting principals.
//!
//! Identities are supplied by the authentication collaborator; this crate only
//! needs their role labels. An absent identity is anonymous and holds no roles.

use serde::{Deserialize, Serialize};

use crate::permissions::RoleSet;

/// The acting principal of a request.
pub trait Identity: Send + Sync {
    /// Roles held by this identity.
    fn roles(&self) -> RoleSet;
}

/// A plain identity carrying an id and an explicit role set.
///
/// # Example
///
/// ```
/// use resource_acl::identity::{Identity, Principal};
///
/// let user = Principal::user("42").with_role("admin");
/// let roles = user.roles();
/// assert!(roles.contains("user:42"));
/// assert!(roles.contains("admin"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier.
    pub id: String,
    /// Roles held by the principal.
    #[serde(default)]
    pub roles: RoleSet,
}

impl Principal {
    /// Create a principal with no roles.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: RoleSet::new(),
        }
    }

    /// Create a user principal holding its own `user:<id>` role.
    pub fn user(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut roles = RoleSet::new();
        roles.insert(Self::own_role(&id));
        Self { id, roles }
    }

    /// The role label that designates a single user.
    pub fn own_role(id: &str) -> String {
        format!("user:{}", id)
    }

    /// Add a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role);
        self
    }
}

impl Identity for Principal {
    fn roles(&self) -> RoleSet {
        self.roles.clone()
    }
}

/// Roles of an optional identity; anonymous callers hold none.
pub fn roles_of(identity: Option<&dyn Identity>) -> RoleSet {
    identity.map(|i| i.roles()).unwrap_or_default()
}
