//! Real-time diagram collaboration hub (§4.3).

pub mod hub;
pub mod protocol;
pub mod reaper;
pub mod session;

pub use hub::SessionHub;
pub use protocol::{ClientMsg, Edit, ParticipantInfo, ServerMsg};
pub use session::{DiagramPersistence, RoleResolver, SessionHandle, SessionStatus};
