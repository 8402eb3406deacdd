//! Webhook subscription store and its quota-governed request path (§4.1,
//! §4.5 Per-user webhook quota). Delivery itself is out of scope (§1
//! Explicitly out of scope: "webhook delivery workers").

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, ErrorKind};
use crate::limits::{QuotaCheck, QuotaKind, UserQuotas, check_quota};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub owner_uuid: Uuid,
    pub target_url: String,
    pub event_types: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Create a subscription after checking the owner's subscription-count
    /// and subscription-request-rate quotas.
    async fn create(&self, quota: &QuotaCheck, overrides: &UserQuotas, subscription: WebhookSubscription) -> Result<WebhookSubscription, Error>;
    async fn get(&self, id: Uuid) -> Result<WebhookSubscription, Error>;
    async fn update(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, Error>;
    async fn delete(&self, id: Uuid) -> Result<(), Error>;
    async fn list_for_owner(&self, owner_uuid: Uuid) -> Result<Vec<WebhookSubscription>, Error>;
}

#[derive(Default)]
pub struct InMemoryWebhookStore {
    rows: RwLock<HashMap<Uuid, WebhookSubscription>>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn count_for_owner(&self, owner_uuid: Uuid) -> usize {
        self.rows.read().values().filter(|s| s.owner_uuid == owner_uuid).count()
    }
}

#[async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn create(&self, quota: &QuotaCheck, overrides: &UserQuotas, mut subscription: WebhookSubscription) -> Result<WebhookSubscription, Error> {
        check_quota(quota, subscription.owner_uuid, QuotaKind::SubscriptionRequestsPerMinute, overrides).await?;
        check_quota(quota, subscription.owner_uuid, QuotaKind::SubscriptionRequestsPerDay, overrides).await?;

        let max_subscriptions = overrides.max_subscriptions.unwrap_or(10);
        if self.count_for_owner(subscription.owner_uuid) as u32 >= max_subscriptions {
            return Err(Error::new(ErrorKind::Conflict, "webhook subscription quota exceeded"));
        }

        if subscription.id == Uuid::nil() {
            subscription.id = Uuid::new_v4();
        }
        subscription.created_at = Some(Utc::now());
        self.rows.write().insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn get(&self, id: Uuid) -> Result<WebhookSubscription, Error> {
        self.rows.read().get(&id).cloned().ok_or_else(|| Error::not_found(format!("webhook subscription {id} not found")))
    }

    async fn update(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, Error> {
        let current = self.get(subscription.id).await?;
        let merged = WebhookSubscription { created_at: current.created_at, ..subscription };
        self.rows.write().insert(merged.id, merged.clone());
        Ok(merged)
    }

    async fn delete(&self, id: Uuid) -> Result<(), Error> {
        self.rows.write().remove(&id).ok_or_else(|| Error::not_found(format!("webhook subscription {id} not found")))?;
        Ok(())
    }

    async fn list_for_owner(&self, owner_uuid: Uuid) -> Result<Vec<WebhookSubscription>, Error> {
        Ok(self.rows.read().values().filter(|s| s.owner_uuid == owner_uuid).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::NoopCacheBackend;
    use crate::config::QuotaConfig;

    fn quota_check() -> QuotaCheck {
        QuotaCheck::new(Arc::new(NoopCacheBackend), QuotaConfig::default())
    }

    #[tokio::test]
    async fn create_succeeds_under_quota() {
        let store = InMemoryWebhookStore::new();
        let quota = quota_check();
        let overrides = UserQuotas::default();
        let owner = Uuid::new_v4();
        let sub = store
            .create(
                &quota,
                &overrides,
                WebhookSubscription { id: Uuid::nil(), owner_uuid: owner, target_url: "https://example.com/hook".into(), event_types: vec!["diagram.updated".into()], created_at: None },
            )
            .await
            .unwrap();
        assert_eq!(store.list_for_owner(owner).await.unwrap().len(), 1);
        assert_ne!(sub.id, Uuid::nil());
    }

    #[tokio::test]
    async fn create_rejected_once_subscription_quota_reached() {
        let store = InMemoryWebhookStore::new();
        let quota = quota_check();
        let overrides = UserQuotas { max_subscriptions: Some(1), ..Default::default() };
        let owner = Uuid::new_v4();
        store
            .create(&quota, &overrides, WebhookSubscription { id: Uuid::nil(), owner_uuid: owner, target_url: "https://a".into(), event_types: vec![], created_at: None })
            .await
            .unwrap();
        let err = store
            .create(&quota, &overrides, WebhookSubscription { id: Uuid::nil(), owner_uuid: owner, target_url: "https://b".into(), event_types: vec![], created_at: None })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn update_changes_target_url_but_keeps_created_at() {
        let store = InMemoryWebhookStore::new();
        let quota = quota_check();
        let overrides = UserQuotas::default();
        let owner = Uuid::new_v4();
        let sub = store
            .create(&quota, &overrides, WebhookSubscription { id: Uuid::nil(), owner_uuid: owner, target_url: "https://a".into(), event_types: vec![], created_at: None })
            .await
            .unwrap();

        let updated = store.update(WebhookSubscription { target_url: "https://b".into(), created_at: None, ..sub.clone() }).await.unwrap();
        assert_eq!(updated.target_url, "https://b");
        assert_eq!(updated.created_at, sub.created_at);
    }
}
