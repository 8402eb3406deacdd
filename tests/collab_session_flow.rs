//! End-to-end exercise of a diagram session through the public collab API:
//! an authorized join, a writer edit broadcast to a second participant, and
//! a host kick — the three-party interaction unit tests don't cover because
//! `session::tests` only ever joins one principal at a time.

use std::sync::Arc;

use async_trait::async_trait;
use tmi_core::cache::Cache;
use tmi_core::collab::hub::SessionHub;
use tmi_core::collab::protocol::ServerMsg;
use tmi_core::collab::session::{DiagramPersistence, RoleResolver};
use tmi_core::error::Error;
use tmi_core::principal::Principal;
use tmi_core::store::{Diagram, DiagramStore, InMemoryDiagramStore};
use tmi_core::types::Role;
use uuid::Uuid;

struct FixedRole(Role);

#[async_trait]
impl RoleResolver for FixedRole {
    async fn resolve(&self, _diagram_id: Uuid, _principal: &Principal) -> Option<Role> {
        Some(self.0)
    }
}

struct DenyEveryone;

#[async_trait]
impl RoleResolver for DenyEveryone {
    async fn resolve(&self, _diagram_id: Uuid, _principal: &Principal) -> Option<Role> {
        None
    }
}

fn alice() -> Principal {
    Principal::new(Uuid::new_v4(), "local", "alice@ex.com")
}

fn bob() -> Principal {
    Principal::new(Uuid::new_v4(), "local", "bob@ex.com")
}

#[tokio::test]
async fn host_edit_is_broadcast_and_kick_removes_participant() {
    let store = Arc::new(InMemoryDiagramStore::new(Cache::disabled()));
    let threat_model_id = Uuid::new_v4();
    let diagram = store.create(Diagram::new(threat_model_id, "context", "data_flow")).await.unwrap();

    let hub = SessionHub::new(Arc::new(FixedRole(Role::Writer)), store.clone() as Arc<dyn DiagramPersistence>);
    let handle = hub.session_for(diagram.id, threat_model_id).await;

    let host = alice();
    let guest = bob();
    let (host_tx, mut host_rx) = tokio::sync::mpsc::unbounded_channel();
    let (guest_tx, mut guest_rx) = tokio::sync::mpsc::unbounded_channel();

    handle.join(host.clone(), "alice".into(), host_tx).await.unwrap();
    assert!(matches!(host_rx.recv().await.unwrap(), ServerMsg::Snapshot { .. }));

    handle.join(guest.clone(), "bob".into(), guest_tx).await.unwrap();
    // host sees the join notification, guest sees its own snapshot first.
    assert!(matches!(host_rx.recv().await.unwrap(), ServerMsg::ParticipantJoined { .. }));
    assert!(matches!(guest_rx.recv().await.unwrap(), ServerMsg::Snapshot { .. }));

    let edit = serde_json::json!({"op": "add", "path": "/cells/-", "value": {"id": Uuid::new_v4(), "shape": "process", "data": {}}});
    let seq = handle.apply(host.internal_uuid, edit.clone()).await.unwrap();
    assert_eq!(seq, 1);
    assert!(matches!(host_rx.recv().await.unwrap(), ServerMsg::DiagramChanged { seq: 1, .. }));
    assert!(matches!(guest_rx.recv().await.unwrap(), ServerMsg::DiagramChanged { seq: 1, .. }));

    // The edit landed in the authoritative store, not just the live session.
    let persisted = store.load_cells(diagram.id).await.unwrap();
    assert_eq!(persisted["cells"].as_array().unwrap().len(), 1);

    handle.kick(host.internal_uuid, guest.internal_uuid).await.unwrap();
    assert!(matches!(guest_rx.recv().await.unwrap(), ServerMsg::RemovedByHost));

    // A kicked participant cannot rejoin until the host calls allow().
    let (retry_tx, _retry_rx) = tokio::sync::mpsc::unbounded_channel();
    let err = handle.join(guest.clone(), "bob".into(), retry_tx).await.unwrap_err();
    assert_eq!(err.kind, tmi_core::error::ErrorKind::Forbidden);
}

#[tokio::test]
async fn hub_reuses_handle_across_calls_for_same_diagram() {
    let persistence: Arc<dyn DiagramPersistence> = Arc::new(StubPersistence);
    let hub = SessionHub::new(Arc::new(FixedRole(Role::Reader)), persistence);
    let diagram_id = Uuid::new_v4();
    let threat_model_id = Uuid::new_v4();

    let first = hub.session_for(diagram_id, threat_model_id).await;
    let second = hub.session_for(diagram_id, threat_model_id).await;
    assert_eq!(first.status().await, second.status().await);
    assert_eq!(hub.active_session_count(), 1);
}

#[tokio::test]
async fn unauthorized_join_never_reaches_the_store() {
    let persistence: Arc<dyn DiagramPersistence> = Arc::new(StubPersistence);
    let hub = SessionHub::new(Arc::new(DenyEveryone), persistence);
    let handle = hub.session_for(Uuid::new_v4(), Uuid::new_v4()).await;
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let err = handle.join(alice(), "alice".into(), tx).await.unwrap_err();
    assert_eq!(err.kind, tmi_core::error::ErrorKind::Forbidden);
}

struct StubPersistence;

#[async_trait]
impl DiagramPersistence for StubPersistence {
    async fn load_cells(&self, _diagram_id: Uuid) -> Result<serde_json::Value, Error> {
        Ok(serde_json::json!({"cells": []}))
    }
    async fn persist_cells(&self, _diagram_id: Uuid, _cells: &serde_json::Value) -> Result<(), Error> {
        Ok(())
    }
}
