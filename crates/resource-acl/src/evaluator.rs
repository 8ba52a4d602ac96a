//! # Permission Evaluator
//!
//! Two independent checks run on the read and write paths:
//!
//! - [`can_perform`] decides *who* may act on a resource instance.
//! - [`check_revision`] / [`can_merge`] decide whether a proposed update is
//!   stale relative to the stored revision.
//!
//! Update flows run `can_perform` first so a permission failure never leaks
//! revision detail.

use crate::error::{AccessError, AccessResult};
use crate::identity::{roles_of, Identity};
use crate::permissions::{Access, Permission};

/// A resource that may carry its own permission.
pub trait Guarded {
    /// Permission attached to this instance, if any.
    fn permission(&self) -> Option<&Permission>;
}

/// A resource that participates in optimistic concurrency.
///
/// Revision 0 means unset.
pub trait Revisioned {
    /// Revision currently held by the value.
    fn current_revision(&self) -> i64;

    /// Advance to the next revision.
    fn set_next_revision(&mut self);
}

/// Resolve the effective permission for a resource instance.
///
/// The instance's own permission wins, then the kind default, then
/// unrestricted.
pub fn effective_permission<'a, R: Guarded + ?Sized>(
    resource: &'a R,
    kind_default: Option<&'a Permission>,
) -> Option<&'a Permission> {
    resource.permission().or(kind_default)
}

/// Check that `identity` may perform `access` under `permission`.
///
/// An empty required role set allows unconditionally. Otherwise the identity
/// must hold at least one required role; an anonymous identity holds none.
///
/// # Example
///
/// ```
/// use resource_acl::evaluator::can_perform;
/// use resource_acl::identity::Principal;
/// use resource_acl::permissions::{Access, Permission};
///
/// let perm = Permission::restricted_to(["admin"]);
/// let admin = Principal::new("1").with_role("admin");
/// let guest = Principal::new("2");
///
/// assert!(can_perform(Some(&perm), Some(&admin), Access::Read).is_ok());
/// assert!(can_perform(Some(&perm), Some(&guest), Access::Read).is_err());
/// assert!(can_perform(None, None, Access::Write).is_ok());
/// ```
pub fn can_perform(
    permission: Option<&Permission>,
    identity: Option<&dyn Identity>,
    access: Access,
) -> AccessResult<()> {
    let Some(permission) = permission else {
        return Ok(());
    };

    let required = permission.required(access);
    if required.is_empty() {
        return Ok(());
    }

    if roles_of(identity).intersects(required) {
        Ok(())
    } else {
        Err(AccessError::PermissionDenied)
    }
}

/// Whether `proposed` was built from the revision currently stored.
pub fn can_merge<C, P>(current: &C, proposed: &P) -> bool
where
    C: Revisioned + ?Sized,
    P: Revisioned + ?Sized,
{
    proposed.current_revision() == current.current_revision()
}

/// Full revision gate for an update.
///
/// A proposed revision of 0 is not a merge attempt at all and fails with
/// `RevisionRequired` before the merge comparison runs.
pub fn check_revision<C, P>(current: &C, proposed: &P) -> AccessResult<()>
where
    C: Revisioned + ?Sized,
    P: Revisioned + ?Sized,
{
    if proposed.current_revision() == 0 {
        return Err(AccessError::RevisionRequired);
    }

    if !can_merge(current, proposed) {
        return Err(AccessError::RevisionConflict {
            submitted: proposed.current_revision(),
            current: current.current_revision(),
        });
    }

    Ok(())
}
