//! Cross-backend caching and invalidation (§4.4).

pub mod backend;
pub mod invalidator;
pub mod keys;

pub use backend::{CacheBackend, CacheError, NoopCacheBackend};
pub use invalidator::{InvalidationEvent, Operation, Strategy, bulk_invalidate, generate_patterns, invalidate};

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::warn;

/// Thin read-through/write-through facade over a [`CacheBackend`], used by
/// the store layer so individual stores don't re-implement
/// serialize-on-write / deserialize-on-read boilerplate.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    async_tx: Option<mpsc::Sender<InvalidationEvent>>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend, async_tx: None }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCacheBackend))
    }

    /// Spawn the background worker that drains `Strategy::Async` events off
    /// the request hot path, and wire this cache's `invalidate` to dispatch
    /// to it instead of running them inline.
    #[must_use]
    pub fn with_async_worker(mut self) -> Self {
        self.async_tx = Some(invalidator::spawn_async_worker(self.backend.clone()));
        self
    }

    pub fn backend(&self) -> Arc<dyn CacheBackend> {
        self.backend.clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, key, "cached value failed to deserialize; treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, key, "cache read failed; falling through to store");
                None
            }
        }
    }

    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => {
                if let Err(e) = self.backend.set(key, &raw).await {
                    warn!(error = %e, key, "cache write failed; swallowing");
                }
            }
            Err(e) => warn!(error = %e, key, "failed to serialize value for cache write"),
        }
    }

    /// Dispatch one invalidation event. `Strategy::Async` events are handed
    /// off to the background worker spawned by [`Self::with_async_worker`]
    /// when one is wired; otherwise (or if the worker has shut down) they
    /// run inline, same as `Immediate`.
    pub async fn invalidate(&self, event: &InvalidationEvent) {
        if event.strategy == Strategy::Async
            && let Some(tx) = &self.async_tx
        {
            if let Err(e) = tx.send(event.clone()).await {
                warn!(error = %e, "async invalidation worker gone; invalidating inline");
                invalidator::invalidate(self.backend.as_ref(), event).await;
            }
            return;
        }
        invalidator::invalidate(self.backend.as_ref(), event).await;
    }
}
