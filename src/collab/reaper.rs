//! Background inactivity scanner (§4.3 Reap).

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::collab::hub::SessionHub;

/// Poll interval for the reap sweep. Independent of the inactivity
/// timeout itself: a short interval just means timed-out sessions are
/// noticed sooner, not that the timeout shortens.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn the background task that periodically asks every session in `hub`
/// whether it has exceeded `inactivity_timeout` and, if so, drives it
/// through Terminating -> Terminated.
pub fn spawn(hub: SessionHub, inactivity_timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&hub, inactivity_timeout).await;
        }
    })
}

async fn sweep_once(hub: &SessionHub, inactivity_timeout: Duration) {
    for handle in hub.live_handles() {
        handle.check_reap(inactivity_timeout).await;
    }
    hub.sweep_terminated().await;
    debug!(active = hub.active_session_count(), "reap sweep completed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::session::{DiagramPersistence, RoleResolver};
    use crate::principal::Principal;
    use crate::types::Role;
    use async_trait::async_trait;
    use std::sync::Arc;
    use uuid::Uuid;

    struct AllowAll;

    #[async_trait]
    impl RoleResolver for AllowAll {
        async fn resolve(&self, _diagram_id: Uuid, _principal: &Principal) -> Option<Role> {
            Some(Role::Writer)
        }
    }

    struct MemoryPersistence;

    #[async_trait]
    impl DiagramPersistence for MemoryPersistence {
        async fn load_cells(&self, _diagram_id: Uuid) -> Result<serde_json::Value, crate::error::Error> {
            Ok(serde_json::json!({}))
        }
        async fn persist_cells(&self, _diagram_id: Uuid, _cells: &serde_json::Value) -> Result<(), crate::error::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn sweep_removes_terminated_sessions_from_the_map() {
        let hub = SessionHub::new(Arc::new(AllowAll), Arc::new(MemoryPersistence));
        let diagram_id = Uuid::new_v4();
        let handle = hub.session_for(diagram_id, Uuid::new_v4()).await;
        let principal = Principal::new(Uuid::new_v4(), "local", "alice@ex.com");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        handle.join(principal.clone(), "alice".into(), tx).await.unwrap();
        handle.leave(principal.internal_uuid).await;
        handle.check_reap(Duration::from_secs(0)).await;

        sweep_once(&hub, Duration::from_secs(15)).await;
        assert_eq!(hub.active_session_count(), 0);
    }

    #[tokio::test]
    async fn sweep_once_drives_the_reap_check_without_a_direct_call() {
        let hub = SessionHub::new(Arc::new(AllowAll), Arc::new(MemoryPersistence));
        let diagram_id = Uuid::new_v4();
        let handle = hub.session_for(diagram_id, Uuid::new_v4()).await;
        let principal = Principal::new(Uuid::new_v4(), "local", "alice@ex.com");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        handle.join(principal.clone(), "alice".into(), tx).await.unwrap();
        handle.leave(principal.internal_uuid).await;

        // No direct `check_reap` call here: `sweep_once` alone must poll the
        // live handle and drive Terminating -> Terminated.
        sweep_once(&hub, Duration::from_secs(15)).await;
        assert_eq!(hub.active_session_count(), 0);
    }
}
