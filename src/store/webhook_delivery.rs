//! Webhook delivery record store (§4.1). Records the attempt history for a
//! subscription; actually dispatching the HTTP call is out of scope (§1
//! Explicitly out of scope: "webhook delivery workers").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::generic::GenericEntity;
use crate::types::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub response_status: Option<u16>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl GenericEntity for WebhookDelivery {
    const ENTITY_TYPE: EntityType = EntityType::WebhookDelivery;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::store::generic::{GenericStore, InMemoryGenericStore};

    fn pending(event_type: &str) -> WebhookDelivery {
        WebhookDelivery {
            id: Uuid::nil(),
            event_type: event_type.into(),
            payload: serde_json::json!({}),
            status: DeliveryStatus::Pending,
            response_status: None,
            created_at: None,
            modified_at: None,
        }
    }

    #[tokio::test]
    async fn create_then_list_for_subscription() {
        let store = InMemoryGenericStore::<WebhookDelivery>::new(Cache::disabled());
        let subscription_id = Uuid::new_v4();
        store.create(subscription_id, pending("diagram.updated")).await.unwrap();
        store.create(subscription_id, pending("threat_model.updated")).await.unwrap();

        let (page, total) = store.list(subscription_id, 0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn patch_marks_a_delivery_delivered() {
        let store = InMemoryGenericStore::<WebhookDelivery>::new(Cache::disabled());
        let subscription_id = Uuid::new_v4();
        let created = store.create(subscription_id, pending("diagram.updated")).await.unwrap();

        let patched = store
            .patch(created.id, &serde_json::json!({"op": "replace", "path": "/status", "value": "delivered"}))
            .await
            .unwrap();
        assert_eq!(patched.status, DeliveryStatus::Delivered);
    }
}
