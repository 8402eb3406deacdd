//! Threat model root-aggregate store (§3 Threat model, §4.1, §4.2).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::policy;
use crate::authz::{AuthorizationEntries, AuthorizationEntry};
use crate::cache::{Cache, InvalidationEvent, Operation as InvalidationOp, Strategy};
use crate::error::Error;
use crate::store::patch::apply_patch;
use crate::types::{EntityType, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatModel {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub threat_model_framework: String,
    pub issue_uri: Option<String>,
    pub status: String,
    pub authorization: AuthorizationEntries,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl ThreatModel {
    pub fn owner_provider_id(&self) -> Option<&str> {
        self.authorization.owner().map(|e| e.provider_id.as_str())
    }
}

#[async_trait]
pub trait ThreatModelStore: Send + Sync {
    async fn create(&self, model: ThreatModel) -> Result<ThreatModel, Error>;
    async fn get(&self, id: Uuid) -> Result<ThreatModel, Error>;
    /// `actor_role` is the requester's role on the *current* stored state,
    /// resolved by the caller before invoking this; enforces the
    /// owner-change rule (§4.2) as part of the write.
    async fn update(&self, actor_role: Role, model: ThreatModel) -> Result<ThreatModel, Error>;
    async fn delete(&self, id: Uuid) -> Result<(), Error>;
    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<ThreatModel>, u64), Error>;

    /// Load the current model, apply a JSON-patch document to it, and write
    /// the result back through [`Self::update`] (§4.1 Patch).
    async fn patch(&self, actor_role: Role, id: Uuid, ops: &serde_json::Value) -> Result<ThreatModel, Error> {
        let current = self.get(id).await?;
        let mut value = serde_json::to_value(&current).map_err(|e| Error::server_error(e.to_string()))?;
        apply_patch(&mut value, ops)?;
        let patched: ThreatModel =
            serde_json::from_value(value).map_err(|e| Error::invalid_input(format!("patched document is not a valid threat model: {e}")))?;
        self.update(actor_role, patched).await
    }
}

pub struct InMemoryThreatModelStore {
    rows: RwLock<HashMap<Uuid, ThreatModel>>,
    cache: Cache,
}

impl InMemoryThreatModelStore {
    pub fn new(cache: Cache) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            cache,
        }
    }
}

#[async_trait]
impl ThreatModelStore for InMemoryThreatModelStore {
    async fn create(&self, mut model: ThreatModel) -> Result<ThreatModel, Error> {
        policy::check_no_duplicate_subjects(&model.authorization)?;
        policy::check_single_owner(&model.authorization)?;

        let now = Utc::now();
        if model.id == Uuid::nil() {
            model.id = Uuid::new_v4();
        }
        model.created_at = Some(now);
        model.modified_at = Some(now);
        let id = model.id;
        self.rows.write().insert(id, model.clone());

        self.cache
            .invalidate(&InvalidationEvent::new(EntityType::ThreatModel, id, InvalidationOp::Create, Strategy::Immediate))
            .await;
        Ok(model)
    }

    async fn get(&self, id: Uuid) -> Result<ThreatModel, Error> {
        let key = crate::cache::keys::entity_key(EntityType::ThreatModel, id);
        if let Some(cached) = self.cache.get::<ThreatModel>(&key).await {
            return Ok(cached);
        }
        let model = self.rows.read().get(&id).cloned().ok_or_else(|| Error::not_found(format!("threat model {id} not found")))?;
        self.cache.set(&key, &model).await;
        Ok(model)
    }

    async fn update(&self, actor_role: Role, mut incoming: ThreatModel) -> Result<ThreatModel, Error> {
        let mut rows = self.rows.write();
        let current = rows.get(&incoming.id).ok_or_else(|| Error::not_found(format!("threat model {} not found", incoming.id)))?.clone();

        let current_owner = current.owner_provider_id().unwrap_or_default().to_string();
        let incoming_owner = incoming
            .authorization
            .owner()
            .map(|e| e.provider_id.clone())
            .ok_or_else(|| Error::invalid_input("threat model must have an owner authorization entry"))?;

        let resolved = policy::apply_owner_change(actor_role, &current_owner, &incoming_owner, incoming.authorization)?;
        policy::check_single_owner(&resolved)?;
        incoming.authorization = resolved;

        incoming.created_at = current.created_at;
        incoming.modified_at = Some(Utc::now());
        rows.insert(incoming.id, incoming.clone());
        drop(rows);

        self.cache
            .invalidate(&InvalidationEvent::new(EntityType::ThreatModel, incoming.id, InvalidationOp::Update, Strategy::Immediate))
            .await;
        Ok(incoming)
    }

    async fn delete(&self, id: Uuid) -> Result<(), Error> {
        self.rows.write().remove(&id).ok_or_else(|| Error::not_found(format!("threat model {id} not found")))?;
        self.cache
            .invalidate(&InvalidationEvent::new(EntityType::ThreatModel, id, InvalidationOp::Delete, Strategy::Immediate))
            .await;
        Ok(())
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<ThreatModel>, u64), Error> {
        let rows = self.rows.read();
        let mut all: Vec<ThreatModel> = rows.values().cloned().collect();
        all.sort_by_key(|m| m.id);
        let total = all.len() as u64;
        let page = all.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}

fn owner_entry(provider_id: &str) -> AuthorizationEntry {
    AuthorizationEntry {
        principal_type: crate::types::PrincipalType::User,
        provider: "local".to_string(),
        provider_id: provider_id.to_string(),
        role: Role::Owner,
    }
}
