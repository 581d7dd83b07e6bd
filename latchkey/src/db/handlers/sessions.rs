//! Session store: session bags keyed by session id.

use crate::db::{
    errors::Result,
    models::sessions::{SessionData, SessionRecord},
};
use crate::types::{SessionId, abbrev_session_id};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use tracing::instrument;

/// Persistence for [`SessionRecord`]s.
///
/// There is no concurrency control: two requests on the same session that both
/// save will race, and the last write wins.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session. Absent and expired records both return `None`.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>>;

    /// Insert or replace a session
    async fn save(&self, record: &SessionRecord) -> Result<()>;

    /// Delete a session, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Delete every expired session, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

#[derive(Debug, FromRow)]
struct Session {
    pub id: SessionId,
    pub data: Json<SessionData>,
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionRecord {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            data: session.data.0,
            expires_at: session.expires_at,
        }
    }
}

/// PostgreSQL-backed [`SessionStore`], using the `sessions` table
#[derive(Debug, Clone)]
pub struct PgSessions {
    pool: PgPool,
}

impl PgSessions {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for PgSessions {
    #[instrument(skip(self, id), fields(session_id = %abbrev_session_id(id)), err)]
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, Session>("SELECT id, data, expires_at FROM sessions WHERE id = $1 AND expires_at > NOW()")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session.map(Into::into))
    }

    #[instrument(skip(self, record), fields(session_id = %abbrev_session_id(&record.id)), err)]
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.id)
        .bind(Json(&record.data))
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, id), fields(session_id = %abbrev_session_id(id)), err)]
    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1").bind(id).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
