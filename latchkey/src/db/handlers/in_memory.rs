//! In-memory store implementations.
//!
//! These keep everything in process memory using concurrent data structures.
//! They back the HTTP tests. The server itself always runs on PostgreSQL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{SessionStore, UserStore};
use crate::db::{
    errors::Result,
    models::{
        sessions::SessionRecord,
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::types::{SessionId, UserId};

/// In-memory [`UserStore`].
///
/// Records are kept in insertion order, which is also creation order, so the
/// first match on a username is the earliest-created user.
#[derive(Clone, Default)]
pub struct InMemoryUsers {
    users: Arc<RwLock<Vec<UserDBResponse>>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            password_hash: request.password_hash.clone(),
            created_at: Utc::now(),
        };

        self.users.write().push(user.clone());

        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.read().iter().find(|u| u.username == username).cloned())
    }

    async fn delete(&self, id: UserId) -> Result<bool> {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}

/// In-memory [`SessionStore`]
#[derive(Clone, Default)]
pub struct InMemorySessions {
    sessions: Arc<DashMap<SessionId, SessionRecord>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Read a record without the expiry filter applied by [`SessionStore::load`]
    pub fn get_raw(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .get(id)
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.sessions.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
