//! Diagram store: cell-graph persistence and the [`DiagramPersistence`]
//! bridge the collaboration hub writes authoritative edits through
//! (§3 Diagram, §4.1, §4.3 Apply).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{Cache, InvalidationEvent, Operation as InvalidationOp, Strategy};
use crate::collab::session::DiagramPersistence;
use crate::error::Error;
use crate::store::patch::apply_patch;
use crate::types::EntityType;

/// One node or edge in a diagram's cell graph. `data` is an opaque,
/// type-specific payload the store never interprets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: Uuid,
    pub shape: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagram {
    pub id: Uuid,
    pub threat_model_id: Uuid,
    pub name: String,
    pub diagram_type: String,
    pub cells: Vec<Cell>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Diagram {
    pub fn new(threat_model_id: Uuid, name: impl Into<String>, diagram_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            threat_model_id,
            name: name.into(),
            diagram_type: diagram_type.into(),
            cells: Vec::new(),
            created_at: None,
            modified_at: None,
        }
    }

    fn cells_as_value(&self) -> Value {
        serde_json::json!({ "cells": self.cells })
    }
}

#[async_trait]
pub trait DiagramStore: Send + Sync {
    async fn create(&self, diagram: Diagram) -> Result<Diagram, Error>;
    async fn get(&self, id: Uuid) -> Result<Diagram, Error>;
    async fn update(&self, diagram: Diagram) -> Result<Diagram, Error>;
    async fn delete(&self, id: Uuid) -> Result<(), Error>;
    async fn list(&self, threat_model_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<Diagram>, u64), Error>;

    /// Load the current diagram, apply a JSON-patch document to it, and
    /// write the result back through [`Self::update`] (§4.1 Patch).
    async fn patch(&self, id: Uuid, ops: &Value) -> Result<Diagram, Error> {
        let current = self.get(id).await?;
        let mut value = serde_json::to_value(&current).map_err(|e| Error::server_error(e.to_string()))?;
        apply_patch(&mut value, ops)?;
        let patched: Diagram =
            serde_json::from_value(value).map_err(|e| Error::invalid_input(format!("patched document is not a valid diagram: {e}")))?;
        self.update(patched).await
    }
}

/// In-memory implementation; also the [`DiagramPersistence`] backend the
/// collaboration hub persists edits through in tests and
/// `--no-default-features` embedding.
pub struct InMemoryDiagramStore {
    rows: RwLock<HashMap<Uuid, Diagram>>,
    cache: Cache,
}

impl InMemoryDiagramStore {
    pub fn new(cache: Cache) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            cache,
        }
    }
}

#[async_trait]
impl DiagramStore for InMemoryDiagramStore {
    async fn create(&self, mut diagram: Diagram) -> Result<Diagram, Error> {
        let now = Utc::now();
        if diagram.id == Uuid::nil() {
            diagram.id = Uuid::new_v4();
        }
        diagram.created_at = Some(now);
        diagram.modified_at = Some(now);
        let id = diagram.id;
        let parent_id = diagram.threat_model_id;
        self.rows.write().insert(id, diagram.clone());

        self.cache
            .invalidate(&InvalidationEvent::new(EntityType::Diagram, id, InvalidationOp::Create, Strategy::Immediate).with_parent(EntityType::ThreatModel, parent_id))
            .await;
        Ok(diagram)
    }

    async fn get(&self, id: Uuid) -> Result<Diagram, Error> {
        let key = crate::cache::keys::entity_key(EntityType::Diagram, id);
        if let Some(cached) = self.cache.get::<Diagram>(&key).await {
            return Ok(cached);
        }
        let diagram = self.rows.read().get(&id).cloned().ok_or_else(|| Error::not_found(format!("diagram {id} not found")))?;
        self.cache.set(&key, &diagram).await;
        Ok(diagram)
    }

    async fn update(&self, mut diagram: Diagram) -> Result<Diagram, Error> {
        let mut rows = self.rows.write();
        let existing = rows.get(&diagram.id).ok_or_else(|| Error::not_found(format!("diagram {} not found", diagram.id)))?;
        diagram.created_at = existing.created_at;
        diagram.modified_at = Some(Utc::now());
        rows.insert(diagram.id, diagram.clone());
        drop(rows);

        self.cache
            .invalidate(&InvalidationEvent::new(EntityType::Diagram, diagram.id, InvalidationOp::Update, Strategy::Immediate).with_parent(EntityType::ThreatModel, diagram.threat_model_id))
            .await;
        Ok(diagram)
    }

    async fn delete(&self, id: Uuid) -> Result<(), Error> {
        let removed = self.rows.write().remove(&id).ok_or_else(|| Error::not_found(format!("diagram {id} not found")))?;
        self.cache
            .invalidate(&InvalidationEvent::new(EntityType::Diagram, id, InvalidationOp::Delete, Strategy::Immediate).with_parent(EntityType::ThreatModel, removed.threat_model_id))
            .await;
        Ok(())
    }

    async fn list(&self, threat_model_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<Diagram>, u64), Error> {
        let rows = self.rows.read();
        let mut matching: Vec<Diagram> = rows.values().filter(|d| d.threat_model_id == threat_model_id).cloned().collect();
        matching.sort_by_key(|d| d.id);
        let total = matching.len() as u64;
        let page = matching.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}

#[async_trait]
impl DiagramPersistence for InMemoryDiagramStore {
    async fn load_cells(&self, diagram_id: Uuid) -> Result<Value, Error> {
        let diagram = self.get(diagram_id).await?;
        Ok(diagram.cells_as_value())
    }

    async fn persist_cells(&self, diagram_id: Uuid, cells: &Value) -> Result<(), Error> {
        let new_cells: Vec<Cell> = cells
            .get("cells")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::server_error(e.to_string()))?
            .unwrap_or_default();

        let mut rows = self.rows.write();
        let diagram = rows.get_mut(&diagram_id).ok_or_else(|| Error::not_found(format!("diagram {diagram_id} not found")))?;
        diagram.cells = new_cells;
        diagram.modified_at = Some(Utc::now());
        let parent_id = diagram.threat_model_id;
        drop(rows);

        self.cache
            .invalidate(&InvalidationEvent::new(EntityType::Diagram, diagram_id, InvalidationOp::Update, Strategy::Async).with_parent(EntityType::ThreatModel, parent_id))
            .await;
        Ok(())
    }
}

/// Adapts any [`DiagramStore`] into a [`DiagramPersistence`] for callers
/// whose concrete store doesn't implement it directly (e.g. the Postgres
/// store, kept slim since its cell persistence reuses the same
/// get/update pair).
pub struct DiagramPersistenceAdapter<S: DiagramStore> {
    store: Arc<S>,
}

impl<S: DiagramStore> DiagramPersistenceAdapter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DiagramStore> DiagramPersistence for DiagramPersistenceAdapter<S> {
    async fn load_cells(&self, diagram_id: Uuid) -> Result<Value, Error> {
        let diagram = self.store.get(diagram_id).await?;
        Ok(diagram.cells_as_value())
    }

    async fn persist_cells(&self, diagram_id: Uuid, cells: &Value) -> Result<(), Error> {
        let mut diagram = self.store.get(diagram_id).await?;
        diagram.cells = cells
            .get("cells")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| Error::server_error(e.to_string()))?
            .unwrap_or_default();
        self.store.update(diagram).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryDiagramStore::new(Cache::disabled());
        let created = store.create(Diagram::new(Uuid::new_v4(), "context", "data_flow")).await.unwrap();
        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched.name, "context");
    }

    #[tokio::test]
    async fn patch_renames_the_diagram_and_persists_through_update() {
        let store = InMemoryDiagramStore::new(Cache::disabled());
        let created = store.create(Diagram::new(Uuid::new_v4(), "context", "data_flow")).await.unwrap();
        let patched = store.patch(created.id, &serde_json::json!({"op": "replace", "path": "/name", "value": "renamed"})).await.unwrap();
        assert_eq!(patched.name, "renamed");
        assert_eq!(store.get(created.id).await.unwrap().name, "renamed");
    }

    #[tokio::test]
    async fn persist_cells_updates_and_reloads() {
        let store = InMemoryDiagramStore::new(Cache::disabled());
        let created = store.create(Diagram::new(Uuid::new_v4(), "context", "data_flow")).await.unwrap();
        let cells = serde_json::json!({"cells": [{"id": Uuid::new_v4(), "shape": "process", "data": {}}]});
        store.persist_cells(created.id, &cells).await.unwrap();
        let loaded = store.load_cells(created.id).await.unwrap();
        assert_eq!(loaded["cells"].as_array().unwrap().len(), 1);
    }
}
