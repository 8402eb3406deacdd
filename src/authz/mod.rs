//! Hierarchical authorization resolution (§4.2).
//!
//! [`resolve_role`] implements the role-resolution order from §4.2:
//! effective-admin override, direct user match, group-transitive match
//! (highest role wins), then no access. [`policy`] implements the
//! owner-change invariant and duplicate-subject rejection; [`admin_check`]
//! implements effective-admin resolution including group-name-to-UUID
//! lookup.

pub mod admin_check;
pub mod policy;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::principal::Principal;
use crate::types::{PrincipalType, Role};

pub use admin_check::{AdministratorDirectory, GroupDirectory};

/// A single authorization entry on a threat model (§3 Authorization entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    pub principal_type: PrincipalType,
    pub provider: String,
    pub provider_id: String,
    pub role: Role,
}

impl AuthorizationEntry {
    pub fn matches_user(&self, principal: &Principal) -> bool {
        self.principal_type == PrincipalType::User
            && self.provider == principal.provider
            && self.provider_id == principal.provider_user_id
    }

    pub fn matches_group(&self, principal_group_keys: &[(String, String)]) -> bool {
        self.principal_type == PrincipalType::Group
            && principal_group_keys
                .iter()
                .any(|(provider, name)| *provider == self.provider && *name == self.provider_id)
    }
}

/// The set of authorization entries carried by one threat model, with the
/// invariants from §3/§8 enforced by [`policy`] rather than by this type
/// alone (construction is intentionally permissive; validation happens at
/// write time).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationEntries(pub Vec<AuthorizationEntry>);

impl AuthorizationEntries {
    pub fn owner(&self) -> Option<&AuthorizationEntry> {
        self.0.iter().find(|e| e.role == Role::Owner && e.principal_type == PrincipalType::User)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthorizationEntry> {
        self.0.iter()
    }
}

/// Resolve `principal`'s effective role on a threat model carrying
/// `entries`, per the §4.2 resolution order.
///
/// `admin_directory` and `group_directory` provide the effective-admin
/// check (step 1) and group-name-to-UUID resolution (used by that check);
/// unknown group names are ignored silently, matching §4.2.
pub fn resolve_role(
    principal: &Principal,
    entries: &AuthorizationEntries,
    admin_directory: &dyn AdministratorDirectory,
    group_directory: &dyn GroupDirectory,
) -> Option<Role> {
    if admin_check::is_effective_admin(principal, admin_directory, group_directory) {
        return Some(Role::Owner);
    }

    if let Some(entry) = entries.0.iter().find(|e| e.matches_user(principal)) {
        return Some(entry.role);
    }

    let principal_group_keys: Vec<(String, String)> = principal
        .group_names
        .iter()
        .map(|name| (principal.provider.clone(), name.clone()))
        .collect();

    entries
        .0
        .iter()
        .filter(|e| e.matches_group(&principal_group_keys))
        .map(|e| e.role)
        .max()
}

/// Diagram access derives entirely from the parent threat model (§4.2
/// Diagram policy): diagrams carry no authorization entries of their own.
pub fn resolve_diagram_role(
    principal: &Principal,
    parent_entries: &AuthorizationEntries,
    admin_directory: &dyn AdministratorDirectory,
    group_directory: &dyn GroupDirectory,
) -> Option<Role> {
    resolve_role(principal, parent_entries, admin_directory, group_directory)
}

/// Convenience: does `principal` have at least `required` role on a
/// resource carrying `entries`?
pub fn has_role(
    principal: &Principal,
    required: Role,
    entries: &AuthorizationEntries,
    admin_directory: &dyn AdministratorDirectory,
    group_directory: &dyn GroupDirectory,
) -> bool {
    resolve_role(principal, entries, admin_directory, group_directory)
        .is_some_and(|role| role.at_least(required))
}

/// A UUID handle for a threat model, used by the cache and store layers.
pub type ThreatModelId = Uuid;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::admin_check::tests::{StaticAdmins, StaticGroups};

    fn principal(provider: &str, id: &str, groups: &[&str]) -> Principal {
        Principal::new(Uuid::new_v4(), provider, id)
            .with_groups(groups.iter().map(|s| s.to_string()).collect())
    }

    fn entry(ptype: PrincipalType, provider: &str, id: &str, role: Role) -> AuthorizationEntry {
        AuthorizationEntry {
            principal_type: ptype,
            provider: provider.to_string(),
            provider_id: id.to_string(),
            role,
        }
    }

    #[test]
    fn direct_user_match_wins_over_absence() {
        let alice = principal("local", "alice@ex.com", &[]);
        let entries = AuthorizationEntries(vec![entry(PrincipalType::User, "local", "alice@ex.com", Role::Writer)]);
        let admins = StaticAdmins::default();
        let groups = StaticGroups::default();
        assert_eq!(resolve_role(&alice, &entries, &admins, &groups), Some(Role::Writer));
    }

    #[test]
    fn group_match_picks_highest_role_among_matches() {
        let bob = principal("local", "bob@ex.com", &["eng", "security"]);
        let entries = AuthorizationEntries(vec![
            entry(PrincipalType::Group, "local", "eng", Role::Reader),
            entry(PrincipalType::Group, "local", "security", Role::Writer),
        ]);
        let admins = StaticAdmins::default();
        let groups = StaticGroups::default();
        assert_eq!(resolve_role(&bob, &entries, &admins, &groups), Some(Role::Writer));
    }

    #[test]
    fn no_match_yields_no_access() {
        let carol = principal("local", "carol@ex.com", &[]);
        let entries = AuthorizationEntries::default();
        let admins = StaticAdmins::default();
        let groups = StaticGroups::default();
        assert_eq!(resolve_role(&carol, &entries, &admins, &groups), None);
    }

    #[test]
    fn effective_admin_always_resolves_to_owner() {
        let admin = principal("local", "admin@ex.com", &[]);
        let entries = AuthorizationEntries::default();
        let admins = StaticAdmins::with_user(admin.internal_uuid);
        let groups = StaticGroups::default();
        assert_eq!(resolve_role(&admin, &entries, &admins, &groups), Some(Role::Owner));
    }
}
