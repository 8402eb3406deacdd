//! Authenticated identity passed into every authorization and collaboration
//! call (§3 Principal, §4.2 Inputs).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated actor: a stable internal identity plus the group names
/// resolved for it at login. Group *names* are resolved to UUIDs lazily by
/// the authorization resolver via [`crate::authz::GroupDirectory`]; unknown
/// names are ignored silently (§4.2 Admin effectiveness).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub internal_uuid: Uuid,
    pub provider: String,
    pub provider_user_id: String,
    pub group_names: Vec<String>,
}

impl Principal {
    pub fn new(internal_uuid: Uuid, provider: impl Into<String>, provider_user_id: impl Into<String>) -> Self {
        Self {
            internal_uuid,
            provider: provider.into(),
            provider_user_id: provider_user_id.into(),
            group_names: Vec::new(),
        }
    }

    pub fn with_groups(mut self, group_names: Vec<String>) -> Self {
        self.group_names = group_names;
        self
    }
}

/// `(internal_uuid, provider, group_name)` — TMI-managed cross-provider
/// groups use provider `"*"` (§3 Group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub internal_uuid: Uuid,
    pub provider: String,
    pub group_name: String,
}

impl Group {
    /// Provider value denoting a TMI-managed, cross-provider group.
    pub const TMI_MANAGED_PROVIDER: &'static str = "*";

    /// Name of the distinguished group every principal implicitly belongs
    /// to, protected from deletion (§3, §4.2 Protected principals).
    pub const EVERYONE: &'static str = "everyone";

    /// Name of the distinguished group granting global admin capability.
    pub const ADMINISTRATORS: &'static str = "Administrators";

    pub fn is_everyone(&self) -> bool {
        self.group_name == Self::EVERYONE
    }
}

/// A row naming either a user or a group as an effective administrator,
/// scoped to a provider (§3 Administrator grant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdministratorGrant {
    User { user_internal_uuid: Uuid },
    Group { group_internal_uuid: Uuid, provider: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_group_is_recognized() {
        let g = Group {
            internal_uuid: Uuid::nil(),
            provider: Group::TMI_MANAGED_PROVIDER.to_string(),
            group_name: Group::EVERYONE.to_string(),
        };
        assert!(g.is_everyone());
    }
}
