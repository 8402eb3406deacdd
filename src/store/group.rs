//! Group store and name-to-UUID resolution (§3 Group, §4.2 Admin
//! effectiveness, group-transitive role match).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::authz::GroupDirectory;
use crate::authz::policy;
use crate::error::Error;
use crate::principal::Group;

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create(&self, group: Group) -> Result<Group, Error>;
    async fn get(&self, internal_uuid: Uuid) -> Result<Group, Error>;
    /// Renaming the `"everyone"` group is forbidden, same as deleting it
    /// (§3, §4.2 Protected principals): it would break the distinguished
    /// name every principal implicitly resolves against.
    async fn update(&self, group: Group) -> Result<Group, Error>;
    /// Forbidden for the `"everyone"` group (§3, §4.2 Protected principals).
    async fn delete(&self, internal_uuid: Uuid) -> Result<(), Error>;
    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<Group>, u64), Error>;
}

pub struct InMemoryGroupStore {
    by_uuid: RwLock<HashMap<Uuid, Group>>,
    by_name: RwLock<HashMap<(String, String), Uuid>>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self {
            by_uuid: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the distinguished `"everyone"` group, done once at startup by
    /// the embedding application; kept out of `new` so tests can opt in.
    pub fn with_everyone_group(self) -> Self {
        let everyone = Group {
            internal_uuid: Uuid::new_v4(),
            provider: Group::TMI_MANAGED_PROVIDER.to_string(),
            group_name: Group::EVERYONE.to_string(),
        };
        self.by_name.write().insert((everyone.provider.clone(), everyone.group_name.clone()), everyone.internal_uuid);
        self.by_uuid.write().insert(everyone.internal_uuid, everyone);
        self
    }
}

impl Default for InMemoryGroupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn create(&self, group: Group) -> Result<Group, Error> {
        self.by_name.write().insert((group.provider.clone(), group.group_name.clone()), group.internal_uuid);
        self.by_uuid.write().insert(group.internal_uuid, group.clone());
        Ok(group)
    }

    async fn get(&self, internal_uuid: Uuid) -> Result<Group, Error> {
        self.by_uuid.read().get(&internal_uuid).cloned().ok_or_else(|| Error::not_found(format!("group {internal_uuid} not found")))
    }

    async fn update(&self, group: Group) -> Result<Group, Error> {
        let current = self.get(group.internal_uuid).await?;
        policy::reject_if_protected_group(&current.group_name)?;
        self.by_name.write().remove(&(current.provider, current.group_name));
        self.by_name.write().insert((group.provider.clone(), group.group_name.clone()), group.internal_uuid);
        self.by_uuid.write().insert(group.internal_uuid, group.clone());
        Ok(group)
    }

    async fn delete(&self, internal_uuid: Uuid) -> Result<(), Error> {
        let group = self.get(internal_uuid).await?;
        policy::reject_if_protected_group(&group.group_name)?;
        self.by_uuid.write().remove(&internal_uuid);
        self.by_name.write().remove(&(group.provider, group.group_name));
        Ok(())
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<Group>, u64), Error> {
        let mut all: Vec<Group> = self.by_uuid.read().values().cloned().collect();
        all.sort_by_key(|g| g.internal_uuid);
        let total = all.len() as u64;
        let page = all.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}

impl GroupDirectory for InMemoryGroupStore {
    fn resolve_group_uuid(&self, provider: &str, group_name: &str) -> Option<Uuid> {
        self.by_name.read().get(&(provider.to_string(), group_name.to_string())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn everyone_group_cannot_be_deleted() {
        let store = InMemoryGroupStore::new().with_everyone_group();
        let uuid = store.resolve_group_uuid(Group::TMI_MANAGED_PROVIDER, Group::EVERYONE).unwrap();
        let err = store.delete(uuid).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ProtectedGroup);
    }

    #[tokio::test]
    async fn ordinary_group_can_be_deleted() {
        let store = InMemoryGroupStore::new();
        let group = Group {
            internal_uuid: Uuid::new_v4(),
            provider: "local".into(),
            group_name: "engineering".into(),
        };
        store.create(group.clone()).await.unwrap();
        store.delete(group.internal_uuid).await.unwrap();
        assert!(store.get(group.internal_uuid).await.is_err());
    }

    #[tokio::test]
    async fn update_renames_an_ordinary_group_and_reindexes_by_name() {
        let store = InMemoryGroupStore::new();
        let group = Group { internal_uuid: Uuid::new_v4(), provider: "local".into(), group_name: "engineering".into() };
        store.create(group.clone()).await.unwrap();

        let renamed = Group { group_name: "platform".into(), ..group.clone() };
        store.update(renamed.clone()).await.unwrap();

        assert!(store.resolve_group_uuid("local", "engineering").is_none());
        assert_eq!(store.resolve_group_uuid("local", "platform"), Some(group.internal_uuid));
    }

    #[tokio::test]
    async fn everyone_group_cannot_be_renamed() {
        let store = InMemoryGroupStore::new().with_everyone_group();
        let uuid = store.resolve_group_uuid(Group::TMI_MANAGED_PROVIDER, Group::EVERYONE).unwrap();
        let renamed = Group { internal_uuid: uuid, provider: Group::TMI_MANAGED_PROVIDER.into(), group_name: "nobody".into() };
        let err = store.update(renamed).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ProtectedGroup);
    }

    #[tokio::test]
    async fn list_paginates_groups() {
        let store = InMemoryGroupStore::new();
        for i in 0..3 {
            store
                .create(Group { internal_uuid: Uuid::new_v4(), provider: "local".into(), group_name: format!("g{i}") })
                .await
                .unwrap();
        }
        let (page, total) = store.list(1, 1).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
    }
}
