//! User store (§3 Ownership and lifecycle: user deletion policy).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub internal_uuid: Uuid,
    pub provider: String,
    pub provider_user_id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// How to resolve a departing user's owned threat models, delegated to the
/// auth service in the full system (§3: "per business policy delegated to
/// the auth service"); this core only models the choice, not the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedResourceDisposition {
    TransferTo(Uuid),
    Delete,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: User) -> Result<User, Error>;
    async fn get(&self, internal_uuid: Uuid) -> Result<User, Error>;
    async fn update(&self, user: User) -> Result<User, Error>;
    async fn find_by_provider_id(&self, provider: &str, provider_user_id: &str) -> Result<User, Error>;
    async fn delete(&self, internal_uuid: Uuid) -> Result<(), Error>;
    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<User>, u64), Error>;
}

#[derive(Default)]
pub struct InMemoryUserStore {
    rows: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, mut user: User) -> Result<User, Error> {
        if user.internal_uuid == Uuid::nil() {
            user.internal_uuid = Uuid::new_v4();
        }
        user.created_at = Some(Utc::now());
        self.rows.write().insert(user.internal_uuid, user.clone());
        Ok(user)
    }

    async fn get(&self, internal_uuid: Uuid) -> Result<User, Error> {
        self.rows.read().get(&internal_uuid).cloned().ok_or_else(|| Error::not_found(format!("user {internal_uuid} not found")))
    }

    async fn find_by_provider_id(&self, provider: &str, provider_user_id: &str) -> Result<User, Error> {
        self.rows
            .read()
            .values()
            .find(|u| u.provider == provider && u.provider_user_id == provider_user_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no user for {provider}:{provider_user_id}")))
    }

    async fn update(&self, user: User) -> Result<User, Error> {
        let current = self.get(user.internal_uuid).await?;
        let merged = User { created_at: current.created_at, ..user };
        self.rows.write().insert(merged.internal_uuid, merged.clone());
        Ok(merged)
    }

    async fn delete(&self, internal_uuid: Uuid) -> Result<(), Error> {
        self.rows.write().remove(&internal_uuid).ok_or_else(|| Error::not_found(format!("user {internal_uuid} not found")))?;
        Ok(())
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<User>, u64), Error> {
        let mut all: Vec<User> = self.rows.read().values().cloned().collect();
        all.sort_by_key(|u| u.internal_uuid);
        let total = all.len() as u64;
        let page = all.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}
