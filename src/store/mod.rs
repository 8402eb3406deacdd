//! Resource store layer (§4.1): CRUD, metadata, and authorization loading
//! for every entity type.

pub mod admin;
pub mod diagram;
pub mod generic;
pub mod group;
pub mod metadata;
pub mod patch;
pub mod quota;
pub mod survey;
pub mod threat_model;
pub mod triage_note;
pub mod user;
pub mod webhook;
pub mod webhook_delivery;

pub use diagram::{Cell, Diagram, DiagramStore, InMemoryDiagramStore};
pub use generic::{GenericEntity, GenericStore, InMemoryGenericStore};
pub use metadata::{InMemoryMetadataStore, MetadataStore};
pub use quota::{InMemoryQuotaOverrideStore, QuotaOverrideStore};
pub use threat_model::{InMemoryThreatModelStore, ThreatModel, ThreatModelStore};
pub use triage_note::{TriageNote, TriageNoteStore};
pub use webhook_delivery::WebhookDelivery;
