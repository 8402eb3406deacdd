//! Process-wide `diagram_id -> Session` map (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::authz::ThreatModelId;
use crate::collab::session::{self, DiagramPersistence, RoleResolver, SessionHandle, SessionStatus};

/// Owns every active session, keyed by diagram id. Cheap to clone: the map
/// itself is behind an `Arc<RwLock<_>>`, a single shared registry rather
/// than a lock per session.
#[derive(Clone)]
pub struct SessionHub {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    resolver: Arc<dyn RoleResolver>,
    persistence: Arc<dyn DiagramPersistence>,
}

impl SessionHub {
    pub fn new(resolver: Arc<dyn RoleResolver>, persistence: Arc<dyn DiagramPersistence>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            resolver,
            persistence,
        }
    }

    /// Returns the existing session for `diagram_id`, spawning a fresh one
    /// if none exists or the previous one reached `Terminated` (§4.3 state
    /// machine: "Terminated is absorbing... a new Join after Terminated
    /// creates a fresh session").
    pub async fn session_for(&self, diagram_id: Uuid, threat_model_id: ThreatModelId) -> SessionHandle {
        if let Some(handle) = self.sessions.read().get(&diagram_id).cloned() {
            if handle.status().await != Some(SessionStatus::Terminated) {
                return handle;
            }
        }

        let handle = session::spawn(diagram_id, threat_model_id, self.resolver.clone(), self.persistence.clone());
        self.sessions.write().insert(diagram_id, handle.clone());
        handle
    }

    /// Drop any session handles whose actor has reached `Terminated`, so the
    /// map doesn't grow unboundedly with dead entries.
    pub async fn sweep_terminated(&self) {
        let candidates: Vec<Uuid> = self.sessions.read().keys().copied().collect();
        for diagram_id in candidates {
            let handle = self.sessions.read().get(&diagram_id).cloned();
            if let Some(handle) = handle {
                if handle.status().await == Some(SessionStatus::Terminated) {
                    self.sessions.write().remove(&diagram_id);
                }
            }
        }
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Every session handle currently tracked, for the reap sweep to poll.
    pub fn live_handles(&self) -> Vec<SessionHandle> {
        self.sessions.read().values().cloned().collect()
    }
}
