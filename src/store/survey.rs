//! Survey response store, unifying the two status-transition APIs found in
//! the source system into one state machine (§9 Open Question 5).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    Draft,
    Submitted,
    Approved,
    ReturnedForRevision,
}

impl SurveyStatus {
    /// `true` if a direct transition from `self` to `target` is legal.
    /// Mirrors a typical review workflow: drafts go to submitted, submitted
    /// responses are either approved or sent back, and a returned response
    /// can only be resubmitted (back to draft first).
    fn can_transition_to(self, target: SurveyStatus) -> bool {
        use SurveyStatus::*;
        matches!(
            (self, target),
            (Draft, Submitted) | (Submitted, Approved) | (Submitted, ReturnedForRevision) | (ReturnedForRevision, Draft)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub threat_model_id: Uuid,
    pub status: SurveyStatus,
    pub answers: Value,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SurveyResponseStore: Send + Sync {
    async fn create(&self, response: SurveyResponse) -> Result<SurveyResponse, Error>;
    async fn get(&self, id: Uuid) -> Result<SurveyResponse, Error>;

    /// The single state-machine entry point every named transition wraps.
    async fn transition(&self, id: Uuid, target: SurveyStatus) -> Result<SurveyResponse, Error>;

    async fn submit(&self, id: Uuid) -> Result<SurveyResponse, Error> {
        self.transition(id, SurveyStatus::Submitted).await
    }

    async fn approve(&self, id: Uuid) -> Result<SurveyResponse, Error> {
        self.transition(id, SurveyStatus::Approved).await
    }

    async fn return_for_revision(&self, id: Uuid) -> Result<SurveyResponse, Error> {
        self.transition(id, SurveyStatus::ReturnedForRevision).await
    }

    /// Coarse alias kept for callers migrating off the older API shape;
    /// behaves identically to [`Self::transition`].
    async fn update_status(&self, id: Uuid, target: SurveyStatus) -> Result<SurveyResponse, Error> {
        self.transition(id, target).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), Error>;
    async fn list(&self, threat_model_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<SurveyResponse>, u64), Error>;
}

pub struct InMemorySurveyResponseStore {
    rows: RwLock<HashMap<Uuid, SurveyResponse>>,
}

impl InMemorySurveyResponseStore {
    pub fn new() -> Self {
        Self { rows: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemorySurveyResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurveyResponseStore for InMemorySurveyResponseStore {
    async fn create(&self, mut response: SurveyResponse) -> Result<SurveyResponse, Error> {
        let now = Utc::now();
        if response.id == Uuid::nil() {
            response.id = Uuid::new_v4();
        }
        response.status = SurveyStatus::Draft;
        response.created_at = Some(now);
        response.modified_at = Some(now);
        self.rows.write().insert(response.id, response.clone());
        Ok(response)
    }

    async fn get(&self, id: Uuid) -> Result<SurveyResponse, Error> {
        self.rows.read().get(&id).cloned().ok_or_else(|| Error::not_found(format!("survey response {id} not found")))
    }

    async fn transition(&self, id: Uuid, target: SurveyStatus) -> Result<SurveyResponse, Error> {
        let mut rows = self.rows.write();
        let response = rows.get_mut(&id).ok_or_else(|| Error::not_found(format!("survey response {id} not found")))?;
        if !response.status.can_transition_to(target) {
            return Err(Error::new(ErrorKind::Conflict, format!("cannot transition survey response from {:?} to {:?}", response.status, target)));
        }
        response.status = target;
        response.modified_at = Some(Utc::now());
        Ok(response.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), Error> {
        self.rows.write().remove(&id).ok_or_else(|| Error::not_found(format!("survey response {id} not found")))?;
        Ok(())
    }

    async fn list(&self, threat_model_id: Uuid, offset: u64, limit: u64) -> Result<(Vec<SurveyResponse>, u64), Error> {
        let mut matching: Vec<SurveyResponse> = self.rows.read().values().filter(|r| r.threat_model_id == threat_model_id).cloned().collect();
        matching.sort_by_key(|r| r.id);
        let total = matching.len() as u64;
        let page = matching.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> SurveyResponse {
        SurveyResponse { id: Uuid::nil(), threat_model_id: Uuid::new_v4(), status: SurveyStatus::Draft, answers: serde_json::json!({}), created_at: None, modified_at: None }
    }

    #[tokio::test]
    async fn submit_then_approve_via_named_transitions() {
        let store = InMemorySurveyResponseStore::new();
        let created = store.create(draft()).await.unwrap();
        store.submit(created.id).await.unwrap();
        let approved = store.approve(created.id).await.unwrap();
        assert_eq!(approved.status, SurveyStatus::Approved);
    }

    #[tokio::test]
    async fn update_status_and_named_transition_agree() {
        let store = InMemorySurveyResponseStore::new();
        let created = store.create(draft()).await.unwrap();
        let via_update_status = store.update_status(created.id, SurveyStatus::Submitted).await.unwrap();
        assert_eq!(via_update_status.status, SurveyStatus::Submitted);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let store = InMemorySurveyResponseStore::new();
        let created = store.create(draft()).await.unwrap();
        let err = store.approve(created.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn delete_removes_the_response() {
        let store = InMemorySurveyResponseStore::new();
        let created = store.create(draft()).await.unwrap();
        store.delete(created.id).await.unwrap();
        assert!(store.get(created.id).await.is_err());
    }

    #[tokio::test]
    async fn list_scopes_to_threat_model_and_paginates() {
        let store = InMemorySurveyResponseStore::new();
        let tm_id = Uuid::new_v4();
        for _ in 0..3 {
            store.create(SurveyResponse { threat_model_id: tm_id, ..draft() }).await.unwrap();
        }
        store.create(draft()).await.unwrap();

        let (page, total) = store.list(tm_id, 1, 1).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
    }
}
