//! Effective-admin resolution (§4.2 Admin effectiveness).
//!
//! A principal is an effective administrator if (a) a grant exists for the
//! user directly, or (b) a grant exists for any group UUID the principal's
//! group *names* resolve to (group grants are provider-scoped). Names with
//! no matching UUID are ignored silently.

use uuid::Uuid;

use crate::principal::Principal;

/// Read-only view over administrator grants, implemented by the store
/// layer's `AdministratorStore` in production and by a static fixture in
/// tests.
pub trait AdministratorDirectory: Send + Sync {
    fn is_admin_user(&self, user_internal_uuid: Uuid) -> bool;
    fn is_admin_group(&self, group_internal_uuid: Uuid, provider: &str) -> bool;
}

/// Resolves a principal's group *names* to internal UUIDs, scoped by
/// provider. Backed by `GroupStore` in production.
pub trait GroupDirectory: Send + Sync {
    fn resolve_group_uuid(&self, provider: &str, group_name: &str) -> Option<Uuid>;
}

/// `true` if `principal` is an effective administrator per §4.2(a)/(b).
pub fn is_effective_admin(
    principal: &Principal,
    admins: &dyn AdministratorDirectory,
    groups: &dyn GroupDirectory,
) -> bool {
    if admins.is_admin_user(principal.internal_uuid) {
        return true;
    }

    principal.group_names.iter().any(|name| {
        groups
            .resolve_group_uuid(&principal.provider, name)
            .is_some_and(|group_uuid| admins.is_admin_group(group_uuid, &principal.provider))
    })
}
