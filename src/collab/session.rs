//! Per-diagram session actor (§4.3 Join/Apply/Kick/Allow/Leave/Reap).
//!
//! One task owns a session's state and drains a command queue serially, so
//! edits within a session can never interleave (§4.3 "last-writer-wins
//! under session-serialized application"). Outbound events fan out over a
//! per-participant channel rather than a shared broadcast, since kicked or
//! disconnected participants need to stop receiving independently of the
//! others, so fan-out is a collection of per-participant senders this
//! actor holds rather than one shared broadcast channel.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authz::ThreatModelId;
use crate::collab::protocol::{ClientMsg, Edit, ParticipantInfo, ServerMsg, participant_info};
use crate::error::{Error, ErrorKind};
use crate::principal::Principal;
use crate::types::Role;

/// Resolves a principal's effective role on the threat model that owns a
/// diagram. Implemented by the store layer in production; a static fixture
/// in tests.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn resolve(&self, diagram_id: Uuid, principal: &Principal) -> Option<Role>;
}

/// Persists authoritative diagram cell state. Implemented by
/// [`crate::store::diagram::DiagramStore`] in production.
#[async_trait]
pub trait DiagramPersistence: Send + Sync {
    async fn load_cells(&self, diagram_id: Uuid) -> Result<serde_json::Value, Error>;
    async fn persist_cells(&self, diagram_id: Uuid, cells: &serde_json::Value) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Terminating,
    Terminated,
}

struct ParticipantSlot {
    principal: Principal,
    display_name: String,
    sink: mpsc::UnboundedSender<ServerMsg>,
}

enum Command {
    Join {
        principal: Principal,
        display_name: String,
        sink: mpsc::UnboundedSender<ServerMsg>,
        respond: oneshot::Sender<Result<(), Error>>,
    },
    Apply {
        principal_uuid: Uuid,
        edit: Edit,
        respond: oneshot::Sender<Result<u64, Error>>,
    },
    Kick {
        host_uuid: Uuid,
        target: Uuid,
        respond: oneshot::Sender<Result<(), Error>>,
    },
    Allow {
        host_uuid: Uuid,
        target: Uuid,
        respond: oneshot::Sender<Result<(), Error>>,
    },
    Leave {
        principal_uuid: Uuid,
    },
    CheckReap {
        inactivity_timeout: Duration,
        respond: oneshot::Sender<SessionStatus>,
    },
    StatusOf {
        respond: oneshot::Sender<SessionStatus>,
    },
}

/// A handle to a running session actor. Cheap to clone; shared by the hub
/// across concurrent callers.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Join a session for `diagram_id`, verifying role >= reader via
    /// `resolver` first. Returns the current roster and cell snapshot
    /// pushed through `sink` as the first [`ServerMsg::Snapshot`].
    pub async fn join(&self, principal: Principal, display_name: String, sink: mpsc::UnboundedSender<ServerMsg>) -> Result<(), Error> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Command::Join {
                principal,
                display_name,
                sink,
                respond,
            })
            .await
            .map_err(|_| Error::server_error("session actor is gone"))?;
        rx.await.map_err(|_| Error::server_error("session actor dropped response"))?
    }

    pub async fn apply(&self, principal_uuid: Uuid, edit: Edit) -> Result<u64, Error> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Command::Apply { principal_uuid, edit, respond })
            .await
            .map_err(|_| Error::server_error("session actor is gone"))?;
        rx.await.map_err(|_| Error::server_error("session actor dropped response"))?
    }

    pub async fn kick(&self, host_uuid: Uuid, target: Uuid) -> Result<(), Error> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Command::Kick { host_uuid, target, respond })
            .await
            .map_err(|_| Error::server_error("session actor is gone"))?;
        rx.await.map_err(|_| Error::server_error("session actor dropped response"))?
    }

    pub async fn allow(&self, host_uuid: Uuid, target: Uuid) -> Result<(), Error> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(Command::Allow { host_uuid, target, respond })
            .await
            .map_err(|_| Error::server_error("session actor is gone"))?;
        rx.await.map_err(|_| Error::server_error("session actor dropped response"))?
    }

    pub async fn leave(&self, principal_uuid: Uuid) {
        let _ = self.tx.send(Command::Leave { principal_uuid }).await;
    }

    pub async fn check_reap(&self, inactivity_timeout: Duration) -> Option<SessionStatus> {
        let (respond, rx) = oneshot::channel();
        self.tx.send(Command::CheckReap { inactivity_timeout, respond }).await.ok()?;
        rx.await.ok()
    }

    pub async fn status(&self) -> Option<SessionStatus> {
        let (respond, rx) = oneshot::channel();
        self.tx.send(Command::StatusOf { respond }).await.ok()?;
        rx.await.ok()
    }
}

/// Route a decoded client message to the matching [`SessionHandle`] call.
/// Kept alongside the actor so transport code has one place to translate
/// wire messages into commands.
pub async fn dispatch(handle: &SessionHandle, principal_uuid: Uuid, msg: ClientMsg) -> Result<(), Error> {
    match msg {
        ClientMsg::Apply { edit } => {
            handle.apply(principal_uuid, edit).await?;
            Ok(())
        }
        ClientMsg::Kick { target } => handle.kick(principal_uuid, target).await,
        ClientMsg::Allow { target } => handle.allow(principal_uuid, target).await,
        ClientMsg::Leave => {
            handle.leave(principal_uuid).await;
            Ok(())
        }
        ClientMsg::Ping => Ok(()),
    }
}

/// Spawn the actor task for `diagram_id` and return a handle to it.
pub fn spawn(
    diagram_id: Uuid,
    threat_model_id: ThreatModelId,
    resolver: std::sync::Arc<dyn RoleResolver>,
    persistence: std::sync::Arc<dyn DiagramPersistence>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run(diagram_id, threat_model_id, resolver, persistence, rx));
    SessionHandle { tx }
}

struct State {
    participants: Vec<ParticipantSlot>,
    deny_list: HashSet<Uuid>,
    cells: serde_json::Value,
    seq: u64,
    last_activity: Instant,
    status: SessionStatus,
}

async fn run(
    diagram_id: Uuid,
    _threat_model_id: ThreatModelId,
    resolver: std::sync::Arc<dyn RoleResolver>,
    persistence: std::sync::Arc<dyn DiagramPersistence>,
    mut rx: mpsc::Receiver<Command>,
) {
    let mut state = State {
        participants: Vec::new(),
        deny_list: HashSet::new(),
        cells: serde_json::Value::Null,
        seq: 0,
        last_activity: Instant::now(),
        status: SessionStatus::Active,
    };

    while let Some(cmd) = rx.recv().await {
        state.last_activity = Instant::now();
        match cmd {
            Command::Join { principal, display_name, sink, respond } => {
                let result = handle_join(&mut state, &diagram_id, resolver.as_ref(), persistence.as_ref(), principal, display_name, sink).await;
                let _ = respond.send(result);
            }
            Command::Apply { principal_uuid, edit, respond } => {
                let result = handle_apply(&mut state, resolver.as_ref(), persistence.as_ref(), diagram_id, principal_uuid, edit).await;
                let _ = respond.send(result);
            }
            Command::Kick { host_uuid, target, respond } => {
                let result = handle_kick_or_allow(&mut state, host_uuid, target, true);
                let _ = respond.send(result);
            }
            Command::Allow { host_uuid, target, respond } => {
                let result = handle_kick_or_allow(&mut state, host_uuid, target, false);
                let _ = respond.send(result);
            }
            Command::Leave { principal_uuid } => handle_leave(&mut state, principal_uuid),
            Command::CheckReap { inactivity_timeout, respond } => {
                let status = handle_reap_check(&mut state, inactivity_timeout);
                let _ = respond.send(status);
            }
            Command::StatusOf { respond } => {
                let _ = respond.send(state.status);
            }
        }

        if state.status == SessionStatus::Terminated {
            debug!(%diagram_id, "session actor exiting, fully drained");
            break;
        }
    }
}

async fn handle_join(
    state: &mut State,
    diagram_id: &Uuid,
    resolver: &dyn RoleResolver,
    persistence: &dyn DiagramPersistence,
    principal: Principal,
    display_name: String,
    sink: mpsc::UnboundedSender<ServerMsg>,
) -> Result<(), Error> {
    let role = resolver.resolve(*diagram_id, &principal).await;
    if !role.is_some_and(|r| r.at_least(Role::Reader)) {
        return Err(Error::new(ErrorKind::Forbidden, "principal lacks reader access to this diagram"));
    }

    if state.deny_list.contains(&principal.internal_uuid) {
        return Err(Error::new(ErrorKind::Forbidden, "principal has been removed from this session by the host"));
    }

    if state.participants.is_empty() {
        state.cells = persistence.load_cells(*diagram_id).await?;
        state.status = SessionStatus::Active;
    }

    let is_host = state.participants.is_empty();
    let roster: Vec<ParticipantInfo> = state
        .participants
        .iter()
        .enumerate()
        .map(|(i, p)| participant_info(&p.principal, &p.display_name, i == 0))
        .collect();

    let joined_info = participant_info(&principal, &display_name, is_host);
    let _ = sink.send(ServerMsg::Snapshot {
        cells: state.cells.clone(),
        participants: roster,
        seq: state.seq,
    });

    for other in &state.participants {
        let _ = other.sink.send(ServerMsg::ParticipantJoined { participant: joined_info.clone() });
    }

    state.participants.push(ParticipantSlot { principal, display_name, sink });
    Ok(())
}

async fn handle_apply(
    state: &mut State,
    resolver: &dyn RoleResolver,
    persistence: &dyn DiagramPersistence,
    diagram_id: Uuid,
    principal_uuid: Uuid,
    edit: Edit,
) -> Result<u64, Error> {
    let Some(slot) = state.participants.iter().find(|p| p.principal.internal_uuid == principal_uuid) else {
        return Err(Error::new(ErrorKind::Forbidden, "principal is not a participant in this session"));
    };

    let role = resolver.resolve(diagram_id, &slot.principal).await;
    if !role.is_some_and(|r| r.at_least(Role::Writer)) {
        return Err(Error::new(ErrorKind::Forbidden, "writer role required to apply edits"));
    }

    crate::store::patch::apply_patch(&mut state.cells, &edit)?;

    if let Err(e) = persistence.persist_cells(diagram_id, &state.cells).await {
        warn!(error = %e, %diagram_id, "edit persistence failed; leaving prior state intact");
        return Err(e);
    }

    state.seq += 1;
    let seq = state.seq;
    for participant in &state.participants {
        let _ = participant.sink.send(ServerMsg::DiagramChanged { seq, edit: edit.clone() });
    }
    Ok(seq)
}

fn handle_kick_or_allow(state: &mut State, host_uuid: Uuid, target: Uuid, kick: bool) -> Result<(), Error> {
    let is_host = state.participants.first().is_some_and(|p| p.principal.internal_uuid == host_uuid);
    if !is_host {
        return Err(Error::new(ErrorKind::Forbidden, "only the host may manage participants"));
    }

    if kick {
        state.deny_list.insert(target);
        if let Some(pos) = state.participants.iter().position(|p| p.principal.internal_uuid == target) {
            let removed = state.participants.remove(pos);
            let _ = removed.sink.send(ServerMsg::RemovedByHost);
        }
    } else {
        state.deny_list.remove(&target);
    }
    Ok(())
}

fn handle_leave(state: &mut State, principal_uuid: Uuid) {
    let Some(pos) = state.participants.iter().position(|p| p.principal.internal_uuid == principal_uuid) else {
        return;
    };
    let was_host = pos == 0;
    state.participants.remove(pos);

    for participant in &state.participants {
        let _ = participant.sink.send(ServerMsg::ParticipantLeft { principal_uuid });
    }

    if state.participants.is_empty() {
        state.status = SessionStatus::Terminating;
        info!("last participant left, session transitioning to Terminating");
    } else if was_host {
        let new_host = &state.participants[0];
        info!(new_host = %new_host.principal.internal_uuid, "host left, promoting longest-connected participant");
    }
}

fn handle_reap_check(state: &mut State, inactivity_timeout: Duration) -> SessionStatus {
    if state.status == SessionStatus::Active && state.last_activity.elapsed() > inactivity_timeout {
        state.status = SessionStatus::Terminating;
        for participant in &state.participants {
            let _ = participant.sink.send(ServerMsg::SessionEnding);
        }
    }
    if state.status == SessionStatus::Terminating && state.participants.is_empty() {
        state.status = SessionStatus::Terminated;
    }
    state.status
}
