//! Database models for sessions.

use crate::types::{SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The session bag, serialized into the `sessions.data` column.
///
/// Every field defaults so records written by older builds still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    /// Reference to the authenticated user, if any
    pub user_id: Option<UserId>,
    /// Flash messages queued for the next home page render
    pub messages: Vec<String>,
    /// Visits to the restricted page within this session
    pub page_count: Option<i64>,
}

/// A persisted session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub data: SessionData,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
