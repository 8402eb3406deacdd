//! Metadata key/value store, addressable by `(entity_type, entity_id, key)`
//! (§3 Metadata, §4.1).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::cache::{Cache, keys};
use crate::error::Error;
use crate::types::EntityType;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn set(&self, entity_type: EntityType, entity_id: Uuid, key: String, value: String) -> Result<(), Error>;
    async fn get(&self, entity_type: EntityType, entity_id: Uuid, key: &str) -> Result<String, Error>;
    async fn list(&self, entity_type: EntityType, entity_id: Uuid) -> Result<HashMap<String, String>, Error>;
    async fn delete(&self, entity_type: EntityType, entity_id: Uuid, key: &str) -> Result<(), Error>;
}

pub struct InMemoryMetadataStore {
    rows: RwLock<HashMap<(EntityType, Uuid), HashMap<String, String>>>,
    cache: Cache,
}

impl InMemoryMetadataStore {
    pub fn new(cache: Cache) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            cache,
        }
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn set(&self, entity_type: EntityType, entity_id: Uuid, key: String, value: String) -> Result<(), Error> {
        self.rows.write().entry((entity_type, entity_id)).or_default().insert(key, value);
        self.cache.backend().del(&keys::metadata_key(entity_type, entity_id)).await.ok();
        Ok(())
    }

    async fn get(&self, entity_type: EntityType, entity_id: Uuid, key: &str) -> Result<String, Error> {
        self.rows
            .read()
            .get(&(entity_type, entity_id))
            .and_then(|m| m.get(key).cloned())
            .ok_or_else(|| Error::not_found(format!("metadata key {key} not found on {entity_type} {entity_id}")))
    }

    async fn list(&self, entity_type: EntityType, entity_id: Uuid) -> Result<HashMap<String, String>, Error> {
        Ok(self.rows.read().get(&(entity_type, entity_id)).cloned().unwrap_or_default())
    }

    async fn delete(&self, entity_type: EntityType, entity_id: Uuid, key: &str) -> Result<(), Error> {
        let removed = self
            .rows
            .write()
            .get_mut(&(entity_type, entity_id))
            .and_then(|m| m.remove(key));
        if removed.is_none() {
            return Err(Error::not_found(format!("metadata key {key} not found on {entity_type} {entity_id}")));
        }
        self.cache.backend().del(&keys::metadata_key(entity_type, entity_id)).await.ok();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryMetadataStore::new(Cache::disabled());
        let id = Uuid::new_v4();
        store.set(EntityType::ThreatModel, id, "owner_team".into(), "platform".into()).await.unwrap();
        assert_eq!(store.get(EntityType::ThreatModel, id, "owner_team").await.unwrap(), "platform");
    }

    #[tokio::test]
    async fn delete_missing_key_is_not_found() {
        let store = InMemoryMetadataStore::new(Cache::disabled());
        let err = store.delete(EntityType::ThreatModel, Uuid::new_v4(), "nope").await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
    }
}
