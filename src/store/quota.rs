//! Per-user quota-override stores backing the `/admin/users/{id}/api_quota`
//! and `/admin/users/{id}/webhook_quota` admin routes (§6, §4.5 Quotas).
//!
//! [`crate::limits::quota`] enforces the sliding-window counters; this
//! module is the admin-facing surface that makes the *overrides* feeding
//! those counters queryable and listable, same as every other entity type
//! (§4.1).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::cache::{Cache, InvalidationEvent, Operation as InvalidationOp, Strategy};
use crate::error::Error;
use crate::limits::UserQuotas;
use crate::types::EntityType;

#[async_trait]
pub trait QuotaOverrideStore: Send + Sync {
    /// `UserQuotas::default()` (meaning "use configured defaults") if the
    /// user has no override on file.
    async fn get(&self, user_internal_uuid: Uuid) -> Result<UserQuotas, Error>;
    async fn set(&self, user_internal_uuid: Uuid, quotas: UserQuotas) -> Result<UserQuotas, Error>;
    async fn delete(&self, user_internal_uuid: Uuid) -> Result<(), Error>;
    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<(Uuid, UserQuotas)>, u64), Error>;
}

/// In-memory quota-override store tagged with the [`EntityType`] used for
/// its cache keys and invalidation routing, so the same implementation
/// backs both the API-quota and webhook-quota admin surfaces as two
/// independently-keyed instances.
pub struct InMemoryQuotaOverrideStore {
    entity_type: EntityType,
    rows: RwLock<HashMap<Uuid, UserQuotas>>,
    cache: Cache,
}

impl InMemoryQuotaOverrideStore {
    pub fn new(entity_type: EntityType, cache: Cache) -> Self {
        Self { entity_type, rows: RwLock::new(HashMap::new()), cache }
    }

    pub fn api_quotas(cache: Cache) -> Self {
        Self::new(EntityType::ApiQuota, cache)
    }

    pub fn webhook_quotas(cache: Cache) -> Self {
        Self::new(EntityType::WebhookQuota, cache)
    }
}

#[async_trait]
impl QuotaOverrideStore for InMemoryQuotaOverrideStore {
    async fn get(&self, user_internal_uuid: Uuid) -> Result<UserQuotas, Error> {
        let key = crate::cache::keys::entity_key(self.entity_type, user_internal_uuid);
        if let Some(cached) = self.cache.get::<UserQuotas>(&key).await {
            return Ok(cached);
        }
        let quotas = self.rows.read().get(&user_internal_uuid).cloned().unwrap_or_default();
        self.cache.set(&key, &quotas).await;
        Ok(quotas)
    }

    async fn set(&self, user_internal_uuid: Uuid, quotas: UserQuotas) -> Result<UserQuotas, Error> {
        if let Some(max_events_per_minute) = quotas.max_events_per_minute {
            crate::validation::registry::max_events_per_minute(&serde_json::json!(max_events_per_minute))?;
        }
        self.rows.write().insert(user_internal_uuid, quotas.clone());
        self.cache
            .invalidate(&InvalidationEvent::new(self.entity_type, user_internal_uuid, InvalidationOp::Update, Strategy::Immediate))
            .await;
        Ok(quotas)
    }

    async fn delete(&self, user_internal_uuid: Uuid) -> Result<(), Error> {
        self.rows.write().remove(&user_internal_uuid);
        self.cache
            .invalidate(&InvalidationEvent::new(self.entity_type, user_internal_uuid, InvalidationOp::Delete, Strategy::Immediate))
            .await;
        Ok(())
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<(Uuid, UserQuotas)>, u64), Error> {
        let mut all: Vec<(Uuid, UserQuotas)> = self.rows.read().iter().map(|(k, v)| (*k, v.clone())).collect();
        all.sort_by_key(|(id, _)| *id);
        let total = all.len() as u64;
        let page = all.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}
