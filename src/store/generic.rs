//! Generic JSONB-backed store for the "leaf" entity kinds that share one
//! shape (threat, document, source, note, asset, repository) — one
//! parameterized store instead of six near-identical hand-written SQL
//! modules (§4.1 AMBIENT STACK).

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{Cache, InvalidationEvent, Operation as InvalidationOp, Strategy};
use crate::error::{Error, ErrorKind};
use crate::store::patch::apply_patch;
use crate::types::EntityType;

/// Describes one generic-store entity kind: its JSON shape, the parent it
/// belongs to, and the entity-type tag used for cache keys and
/// invalidation routing.
pub trait GenericEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const ENTITY_TYPE: EntityType;

    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_modified_at(&mut self, at: DateTime<Utc>);
}

#[async_trait]
pub trait GenericStore<E: GenericEntity>: Send + Sync {
    async fn create(&self, parent_id: Uuid, entity: E) -> Result<E, Error>;
    async fn get(&self, id: Uuid) -> Result<E, Error>;
    async fn update(&self, entity: E) -> Result<E, Error>;
    async fn delete(&self, id: Uuid) -> Result<(), Error>;
    async fn list(&self, parent_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<E>, u64), Error>;

    /// Load the current entity, apply a JSON-patch document to it, and
    /// write the result back through [`Self::update`] (§4.1 Patch).
    async fn patch(&self, id: Uuid, ops: &Value) -> Result<E, Error> {
        let current = self.get(id).await?;
        let mut value = serde_json::to_value(&current).map_err(|e| Error::server_error(e.to_string()))?;
        apply_patch(&mut value, ops)?;
        let patched: E = serde_json::from_value(value).map_err(|e| Error::invalid_input(format!("patched document does not match entity shape: {e}")))?;
        self.update(patched).await
    }
}

/// In-memory implementation used for tests and `--no-default-features`
/// embedding.
pub struct InMemoryGenericStore<E: GenericEntity> {
    rows: RwLock<HashMap<Uuid, (Uuid, E)>>,
    cache: Cache,
    _marker: PhantomData<E>,
}

impl<E: GenericEntity> InMemoryGenericStore<E> {
    pub fn new(cache: Cache) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            cache,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E: GenericEntity> GenericStore<E> for InMemoryGenericStore<E> {
    async fn create(&self, parent_id: Uuid, mut entity: E) -> Result<E, Error> {
        let now = Utc::now();
        if entity.id() == Uuid::nil() {
            entity.set_id(Uuid::new_v4());
        }
        entity.set_created_at(now);
        entity.set_modified_at(now);
        let id = entity.id();
        self.rows.write().insert(id, (parent_id, entity.clone()));

        self.cache
            .invalidate(&InvalidationEvent::new(E::ENTITY_TYPE, id, InvalidationOp::Create, Strategy::Immediate).with_parent(EntityType::ThreatModel, parent_id))
            .await;
        Ok(entity)
    }

    async fn get(&self, id: Uuid) -> Result<E, Error> {
        let key = crate::cache::keys::entity_key(E::ENTITY_TYPE, id);
        if let Some(cached) = self.cache.get::<E>(&key).await {
            return Ok(cached);
        }
        let entity = self
            .rows
            .read()
            .get(&id)
            .map(|(_, e)| e.clone())
            .ok_or_else(|| Error::not_found(format!("{} {id} not found", E::ENTITY_TYPE)))?;
        self.cache.set(&key, &entity).await;
        Ok(entity)
    }

    async fn update(&self, mut entity: E) -> Result<E, Error> {
        let id = entity.id();
        let mut rows = self.rows.write();
        let Some((parent_id, existing)) = rows.get(&id) else {
            return Err(Error::not_found(format!("{} {id} not found", E::ENTITY_TYPE)));
        };
        let parent_id = *parent_id;
        if let Some(created) = existing.created_at() {
            entity.set_created_at(created);
        }
        entity.set_modified_at(Utc::now());
        rows.insert(id, (parent_id, entity.clone()));
        drop(rows);

        self.cache
            .invalidate(&InvalidationEvent::new(E::ENTITY_TYPE, id, InvalidationOp::Update, Strategy::Immediate).with_parent(EntityType::ThreatModel, parent_id))
            .await;
        Ok(entity)
    }

    async fn delete(&self, id: Uuid) -> Result<(), Error> {
        let removed = self.rows.write().remove(&id);
        let Some((parent_id, _)) = removed else {
            return Err(Error::not_found(format!("{} {id} not found", E::ENTITY_TYPE)));
        };

        self.cache
            .invalidate(&InvalidationEvent::new(E::ENTITY_TYPE, id, InvalidationOp::Delete, Strategy::Immediate).with_parent(EntityType::ThreatModel, parent_id))
            .await;
        Ok(())
    }

    async fn list(&self, parent_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<E>, u64), Error> {
        let rows = self.rows.read();
        let mut matching: Vec<E> = rows.values().filter(|(p, _)| *p == parent_id).map(|(_, e)| e.clone()).collect();
        matching.sort_by_key(|e| e.id());
        let total = matching.len() as u64;
        let page = matching.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}

/// Postgres-backed implementation storing each entity kind's row as JSONB
/// in a shared `generic_entities` table, keyed by `(entity_type, id)`.
#[cfg(feature = "postgres")]
pub mod pg {
    use super::*;
    use sqlx::PgPool;
    use sqlx::Row;

    pub struct PgGenericStore<E: GenericEntity> {
        pool: PgPool,
        cache: Cache,
        _marker: PhantomData<E>,
    }

    impl<E: GenericEntity> PgGenericStore<E> {
        pub fn new(pool: PgPool, cache: Cache) -> Self {
            Self {
                pool,
                cache,
                _marker: PhantomData,
            }
        }
    }

    #[async_trait]
    impl<E: GenericEntity> GenericStore<E> for PgGenericStore<E> {
        async fn create(&self, parent_id: Uuid, mut entity: E) -> Result<E, Error> {
            let now = Utc::now();
            if entity.id() == Uuid::nil() {
                entity.set_id(Uuid::new_v4());
            }
            entity.set_created_at(now);
            entity.set_modified_at(now);
            let body = serde_json::to_value(&entity).map_err(|e| Error::server_error(e.to_string()))?;

            let mut tx = self.pool.begin().await.map_err(pg_err)?;
            sqlx::query(
                "INSERT INTO generic_entities (id, entity_type, parent_id, body, created_at, modified_at) \
                 VALUES ($1, $2, $3, $4, $5, $5)",
            )
            .bind(entity.id())
            .bind(E::ENTITY_TYPE.as_str())
            .bind(parent_id)
            .bind(&body)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(pg_err)?;
            tx.commit().await.map_err(pg_err)?;

            self.cache
                .invalidate(&InvalidationEvent::new(E::ENTITY_TYPE, entity.id(), InvalidationOp::Create, Strategy::Immediate).with_parent(EntityType::ThreatModel, parent_id))
                .await;
            Ok(entity)
        }

        async fn get(&self, id: Uuid) -> Result<E, Error> {
            let key = crate::cache::keys::entity_key(E::ENTITY_TYPE, id);
            if let Some(cached) = self.cache.get::<E>(&key).await {
                return Ok(cached);
            }

            let row = sqlx::query("SELECT body FROM generic_entities WHERE id = $1 AND entity_type = $2")
                .bind(id)
                .bind(E::ENTITY_TYPE.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(pg_err)?
                .ok_or_else(|| Error::not_found(format!("{} {id} not found", E::ENTITY_TYPE)))?;
            let body: serde_json::Value = row.try_get("body").map_err(pg_err)?;
            let entity: E = serde_json::from_value(body).map_err(|e| Error::server_error(e.to_string()))?;
            self.cache.set(&key, &entity).await;
            Ok(entity)
        }

        async fn update(&self, mut entity: E) -> Result<E, Error> {
            entity.set_modified_at(Utc::now());
            let body = serde_json::to_value(&entity).map_err(|e| Error::server_error(e.to_string()))?;

            let row = sqlx::query(
                "UPDATE generic_entities SET body = $1, modified_at = $2 \
                 WHERE id = $3 AND entity_type = $4 RETURNING parent_id",
            )
            .bind(&body)
            .bind(Utc::now())
            .bind(entity.id())
            .bind(E::ENTITY_TYPE.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .ok_or_else(|| Error::not_found(format!("{} {} not found", E::ENTITY_TYPE, entity.id())))?;
            let parent_id: Uuid = row.try_get("parent_id").map_err(pg_err)?;

            self.cache
                .invalidate(&InvalidationEvent::new(E::ENTITY_TYPE, entity.id(), InvalidationOp::Update, Strategy::Immediate).with_parent(EntityType::ThreatModel, parent_id))
                .await;
            Ok(entity)
        }

        async fn delete(&self, id: Uuid) -> Result<(), Error> {
            let row = sqlx::query("DELETE FROM generic_entities WHERE id = $1 AND entity_type = $2 RETURNING parent_id")
                .bind(id)
                .bind(E::ENTITY_TYPE.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(pg_err)?
                .ok_or_else(|| Error::not_found(format!("{} {id} not found", E::ENTITY_TYPE)))?;
            let parent_id: Uuid = row.try_get("parent_id").map_err(pg_err)?;

            self.cache
                .invalidate(&InvalidationEvent::new(E::ENTITY_TYPE, id, InvalidationOp::Delete, Strategy::Immediate).with_parent(EntityType::ThreatModel, parent_id))
                .await;
            Ok(())
        }

        async fn list(&self, parent_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<E>, u64), Error> {
            let total: i64 = sqlx::query_scalar("SELECT count(*) FROM generic_entities WHERE parent_id = $1 AND entity_type = $2")
                .bind(parent_id)
                .bind(E::ENTITY_TYPE.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(pg_err)?;

            let rows = sqlx::query(
                "SELECT body FROM generic_entities WHERE parent_id = $1 AND entity_type = $2 \
                 ORDER BY created_at OFFSET $3 LIMIT $4",
            )
            .bind(parent_id)
            .bind(E::ENTITY_TYPE.as_str())
            .bind(offset as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(pg_err)?;

            let mut items = Vec::with_capacity(rows.len());
            for row in rows {
                let body: serde_json::Value = row.try_get("body").map_err(pg_err)?;
                items.push(serde_json::from_value(body).map_err(|e| Error::server_error(e.to_string()))?);
            }
            Ok((items, total.max(0) as u64))
        }
    }

    fn pg_err(e: sqlx::Error) -> Error {
        if matches!(e, sqlx::Error::RowNotFound) {
            Error::new(ErrorKind::NotFound, "not found")
        } else {
            Error::server_error(e.to_string())
        }
    }
}

#[cfg(feature = "postgres")]
pub use pg::PgGenericStore;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        text: String,
        created_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
    }

    impl GenericEntity for Note {
        const ENTITY_TYPE: EntityType = EntityType::Note;

        fn id(&self) -> Uuid {
            self.id
        }
        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }
        fn created_at(&self) -> Option<DateTime<Utc>> {
            self.created_at
        }
        fn set_created_at(&mut self, at: DateTime<Utc>) {
            self.created_at = Some(at);
        }
        fn set_modified_at(&mut self, at: DateTime<Utc>) {
            self.modified_at = Some(at);
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryGenericStore::<Note>::new(Cache::disabled());
        let parent = Uuid::new_v4();
        let created = store
            .create(parent, Note { id: Uuid::nil(), text: "hi".into(), created_at: None, modified_at: None })
            .await
            .unwrap();
        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched.text, "hi");
    }

    #[tokio::test]
    async fn patch_updates_a_field_and_persists_through_update() {
        let store = InMemoryGenericStore::<Note>::new(Cache::disabled());
        let parent = Uuid::new_v4();
        let created = store
            .create(parent, Note { id: Uuid::nil(), text: "hi".into(), created_at: None, modified_at: None })
            .await
            .unwrap();
        let patched = store.patch(created.id, &serde_json::json!({"op": "replace", "path": "/text", "value": "bye"})).await.unwrap();
        assert_eq!(patched.text, "bye");
        assert_eq!(store.get(created.id).await.unwrap().text, "bye");
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = InMemoryGenericStore::<Note>::new(Cache::disabled());
        let parent = Uuid::new_v4();
        let created = store
            .create(parent, Note { id: Uuid::nil(), text: "bye".into(), created_at: None, modified_at: None })
            .await
            .unwrap();
        store.delete(created.id).await.unwrap();
        let err = store.get(created.id).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn list_paginates_within_parent() {
        let store = InMemoryGenericStore::<Note>::new(Cache::disabled());
        let parent = Uuid::new_v4();
        for i in 0..5 {
            store
                .create(parent, Note { id: Uuid::nil(), text: format!("n{i}"), created_at: None, modified_at: None })
                .await
                .unwrap();
        }
        let (page, total) = store.list(parent, 2, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
    }
}
