//! Administrator grant store (§3 Administrator grant, §4.2 Admin
//! effectiveness).

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::authz::AdministratorDirectory;
use crate::error::Error;
use crate::principal::AdministratorGrant;

#[async_trait]
pub trait AdministratorStore: Send + Sync {
    async fn grant(&self, grant: AdministratorGrant) -> Result<(), Error>;
    /// `Err(NotFound)` if `grant` isn't currently held.
    async fn get(&self, grant: &AdministratorGrant) -> Result<AdministratorGrant, Error>;
    async fn revoke(&self, grant: &AdministratorGrant) -> Result<(), Error>;
    async fn list(&self) -> Result<Vec<AdministratorGrant>, Error>;
}

#[derive(Default)]
pub struct InMemoryAdministratorStore {
    user_grants: RwLock<HashSet<Uuid>>,
    group_grants: RwLock<HashSet<(Uuid, String)>>,
}

impl InMemoryAdministratorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdministratorStore for InMemoryAdministratorStore {
    async fn grant(&self, grant: AdministratorGrant) -> Result<(), Error> {
        match grant {
            AdministratorGrant::User { user_internal_uuid } => {
                self.user_grants.write().insert(user_internal_uuid);
            }
            AdministratorGrant::Group { group_internal_uuid, provider } => {
                self.group_grants.write().insert((group_internal_uuid, provider));
            }
        }
        Ok(())
    }

    async fn get(&self, grant: &AdministratorGrant) -> Result<AdministratorGrant, Error> {
        let held = match grant {
            AdministratorGrant::User { user_internal_uuid } => self.user_grants.read().contains(user_internal_uuid),
            AdministratorGrant::Group { group_internal_uuid, provider } => {
                self.group_grants.read().contains(&(*group_internal_uuid, provider.clone()))
            }
        };
        if held {
            Ok(grant.clone())
        } else {
            Err(Error::not_found("administrator grant not found"))
        }
    }

    async fn revoke(&self, grant: &AdministratorGrant) -> Result<(), Error> {
        match grant {
            AdministratorGrant::User { user_internal_uuid } => {
                self.user_grants.write().remove(user_internal_uuid);
            }
            AdministratorGrant::Group { group_internal_uuid, provider } => {
                self.group_grants.write().remove(&(*group_internal_uuid, provider.clone()));
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AdministratorGrant>, Error> {
        let mut grants: Vec<AdministratorGrant> = self
            .user_grants
            .read()
            .iter()
            .map(|uuid| AdministratorGrant::User { user_internal_uuid: *uuid })
            .collect();
        grants.extend(
            self.group_grants
                .read()
                .iter()
                .map(|(uuid, provider)| AdministratorGrant::Group { group_internal_uuid: *uuid, provider: provider.clone() }),
        );
        Ok(grants)
    }
}

impl AdministratorDirectory for InMemoryAdministratorStore {
    fn is_admin_user(&self, user_internal_uuid: Uuid) -> bool {
        self.user_grants.read().contains(&user_internal_uuid)
    }

    fn is_admin_group(&self, group_internal_uuid: Uuid, provider: &str) -> bool {
        self.group_grants.read().contains(&(group_internal_uuid, provider.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn granted_user_is_recognized_as_admin() {
        let store = InMemoryAdministratorStore::new();
        let uuid = Uuid::new_v4();
        store.grant(AdministratorGrant::User { user_internal_uuid: uuid }).await.unwrap();
        assert!(store.is_admin_user(uuid));
    }

    #[tokio::test]
    async fn revoked_group_grant_is_no_longer_recognized() {
        let store = InMemoryAdministratorStore::new();
        let uuid = Uuid::new_v4();
        let grant = AdministratorGrant::Group { group_internal_uuid: uuid, provider: "local".into() };
        store.grant(grant.clone()).await.unwrap();
        assert!(store.is_admin_group(uuid, "local"));
        store.revoke(&grant).await.unwrap();
        assert!(!store.is_admin_group(uuid, "local"));
    }
}
