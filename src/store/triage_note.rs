//! Triage note store (§3 Triage note: "append-only log attached to a survey
//! response. Sequential integer ID within its parent.").
//!
//! Backed by [`InMemoryGenericStore`] for persistence and cache
//! invalidation, with a sequence counter layered on top: the generic
//! store's `id` is the usual UUID primary key, but callers needing the
//! parent-scoped ordering use `sequence` instead.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::Cache;
use crate::error::Error;
use crate::store::generic::{GenericEntity, GenericStore, InMemoryGenericStore};
use crate::types::EntityType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageNote {
    pub id: Uuid,
    pub sequence: u64,
    pub author_uuid: Uuid,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl GenericEntity for TriageNote {
    const ENTITY_TYPE: EntityType = EntityType::TriageNote;

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
    fn set_modified_at(&mut self, at: DateTime<Utc>) {
        self.modified_at = Some(at);
    }
}

/// Append-only front over [`InMemoryGenericStore`]: no `update`/`delete`/
/// `patch` are exposed, since a triage note log is never edited or
/// reordered once written (§3).
pub struct TriageNoteStore {
    inner: InMemoryGenericStore<TriageNote>,
    next_sequence: RwLock<HashMap<Uuid, u64>>,
}

impl TriageNoteStore {
    pub fn new(cache: Cache) -> Self {
        Self {
            inner: InMemoryGenericStore::new(cache),
            next_sequence: RwLock::new(HashMap::new()),
        }
    }

    /// Append `note` to `survey_response_id`'s log, assigning the next
    /// sequence number within that parent.
    pub async fn append(&self, survey_response_id: Uuid, mut note: TriageNote) -> Result<TriageNote, Error> {
        let sequence = {
            let mut next = self.next_sequence.write();
            let entry = next.entry(survey_response_id).or_insert(0);
            *entry += 1;
            *entry
        };
        note.sequence = sequence;
        self.inner.create(survey_response_id, note).await
    }

    pub async fn get(&self, id: Uuid) -> Result<TriageNote, Error> {
        self.inner.get(id).await
    }

    pub async fn list(&self, survey_response_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<TriageNote>, u64), Error> {
        self.inner.list(survey_response_id, offset, limit).await
    }
}
