//! Wires the group store, administrator store, and threat-model store
//! together through [`resolve_role`] the way a request handler would: group
//! membership resolved to a role, then overridden by effective-admin status.

use tmi_core::authz::policy::check_single_owner;
use tmi_core::authz::{resolve_role, AuthorizationEntries, AuthorizationEntry, GroupDirectory};
use tmi_core::cache::Cache;
use tmi_core::principal::{AdministratorGrant, Group, Principal};
use tmi_core::store::admin::{AdministratorStore, InMemoryAdministratorStore};
use tmi_core::store::group::{GroupStore, InMemoryGroupStore};
use tmi_core::store::threat_model::InMemoryThreatModelStore;
use tmi_core::store::{ThreatModel, ThreatModelStore};
use tmi_core::types::{PrincipalType, Role};
use uuid::Uuid;

fn owner_entry(provider_id: &str) -> AuthorizationEntry {
    AuthorizationEntry {
        principal_type: PrincipalType::User,
        provider: "local".into(),
        provider_id: provider_id.into(),
        role: Role::Owner,
    }
}

fn group_entry(name: &str, role: Role) -> AuthorizationEntry {
    AuthorizationEntry {
        principal_type: PrincipalType::Group,
        provider: "local".into(),
        provider_id: name.into(),
        role,
    }
}

#[tokio::test]
async fn group_membership_grants_writer_role_on_a_real_threat_model() {
    let groups = InMicroGroups::seeded().await;
    let admins = InMemoryAdministratorStore::new();

    let tm_store = InMemoryThreatModelStore::new(Cache::disabled());
    let model = ThreatModel {
        id: Uuid::nil(),
        name: "payments".into(),
        description: String::new(),
        threat_model_framework: "STRIDE".into(),
        issue_uri: None,
        status: "active".into(),
        authorization: AuthorizationEntries(vec![owner_entry("owner@ex.com"), group_entry("engineering", Role::Writer)]),
        created_at: None,
        modified_at: None,
    };
    let created = tm_store.create(model).await.unwrap();

    let engineer = Principal::new(Uuid::new_v4(), "local", "dev@ex.com").with_groups(vec!["engineering".to_string()]);
    let role = resolve_role(&engineer, &created.authorization, &admins, &groups.store);
    assert_eq!(role, Some(Role::Writer));
}

#[tokio::test]
async fn effective_admin_outranks_an_explicit_reader_grant() {
    let groups = InMicroGroups::seeded().await;
    let admins = InMemoryAdministratorStore::new();

    let admin_principal = Principal::new(Uuid::new_v4(), "local", "root@ex.com").with_groups(vec!["Administrators".to_string()]);
    let admin_group_uuid = groups.store.resolve_group_uuid("local", "Administrators").unwrap();
    admins
        .grant(AdministratorGrant::Group { group_internal_uuid: admin_group_uuid, provider: "local".into() })
        .await
        .unwrap();

    let entries = AuthorizationEntries(vec![AuthorizationEntry {
        principal_type: PrincipalType::User,
        provider: "local".into(),
        provider_id: "root@ex.com".into(),
        role: Role::Reader,
    }]);

    let role = resolve_role(&admin_principal, &entries, &admins, &groups.store);
    assert_eq!(role, Some(Role::Owner));
}

#[test]
fn a_model_with_no_owner_entry_fails_the_single_owner_invariant() {
    let entries = AuthorizationEntries(vec![group_entry("engineering", Role::Writer)]);
    assert!(check_single_owner(&entries).is_err());
}

struct InMicroGroups {
    store: InMemoryGroupStore,
}

impl InMicroGroups {
    async fn seeded() -> Self {
        let store = InMemoryGroupStore::new();
        store
            .create(Group {
                internal_uuid: Uuid::new_v4(),
                provider: "local".into(),
                group_name: "engineering".into(),
            })
            .await
            .unwrap();
        store
            .create(Group {
                internal_uuid: Uuid::new_v4(),
                provider: "local".into(),
                group_name: "Administrators".into(),
            })
            .await
            .unwrap();
        Self { store }
    }
}
