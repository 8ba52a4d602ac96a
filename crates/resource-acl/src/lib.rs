//! # Resource ACL
//!
//! Capability-based permission evaluation for resource records, with
//! optimistic-concurrency conflict detection.
//!
//! ## Overview
//!
//! The resource-acl crate handles:
//! - **Operations**: Which CRUD/query operations a kind enables ([`AccessPolicy`])
//! - **Permissions**: Read and write role sets attached to an instance or kind
//! - **Identities**: The acting principal and its roles
//! - **Evaluation**: [`can_perform`] for who may act, [`check_revision`] for staleness
//!
//! ## Usage
//!
//! ```rust
//! use resource_acl::{can_perform, Access, Permission, Principal};
//!
//! let perm = Permission::restricted_to(["admin", "ceo"]);
//! let user = Principal::user("42");
//!
//! // A user without admin or ceo is denied
//! assert!(can_perform(Some(&perm), Some(&user), Access::Read).is_err());
//!
//! // Granting a matching role allows access
//! let user = user.with_role("admin");
//! assert!(can_perform(Some(&perm), Some(&user), Access::Read).is_ok());
//! ```
//!
//! ## Revisions
//!
//! Revisioned resources expose a counter starting at 0 (unset). Every update
//! must carry the currently stored revision; a successful write advances it by
//! exactly one.

pub mod actions;
pub mod error;
pub mod evaluator;
pub mod identity;
pub mod permissions;

// Re-export main types for convenience
pub use actions::{AccessPolicy, Operation};
pub use error::{AccessError, AccessResult};
pub use evaluator::{can_merge, can_perform, check_revision, effective_permission, Guarded, Revisioned};
pub use identity::{Identity, Principal};
pub use permissions::{Access, Permission, RoleSet};
