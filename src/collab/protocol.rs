//! Wire messages exchanged between a collaboration session and its
//! participants (§4.3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::principal::Principal;

/// A participant-authored mutation to diagram cells, applied as an
/// authoritative patch by the session actor.
pub type Edit = Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    Apply { edit: Edit },
    Kick { target: Uuid },
    Allow { target: Uuid },
    Leave,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub principal_uuid: Uuid,
    pub display_name: String,
    pub is_host: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    Snapshot {
        cells: Value,
        participants: Vec<ParticipantInfo>,
        seq: u64,
    },
    DiagramChanged {
        seq: u64,
        edit: Edit,
    },
    ParticipantJoined {
        participant: ParticipantInfo,
    },
    ParticipantLeft {
        principal_uuid: Uuid,
    },
    RemovedByHost,
    SessionEnding,
    Pong,
    Error {
        code: String,
        message: String,
    },
}

pub(crate) fn participant_info(principal: &Principal, display_name: &str, is_host: bool) -> ParticipantInfo {
    ParticipantInfo {
        principal_uuid: principal.internal_uuid,
        display_name: display_name.to_string(),
        is_host,
    }
}
