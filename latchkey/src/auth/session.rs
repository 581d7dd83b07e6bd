//! Server-side sessions keyed by a signed cookie.
//!
//! The cookie carries only an opaque session id plus an HMAC-SHA256 tag over it:
//! `{id}.{base64url(hmac(id))}`. Everything else lives in the [`SessionStore`].
//!
//! [`session_middleware`] runs around every page route. It resolves the cookie
//! to a [`Session`] handle (creating a fresh one when the cookie is missing,
//! forged, unknown or expired), resolves the session's [`Identity`], and exposes
//! both to handlers as request extensions. After the handler returns it writes
//! the session back if it is new or was modified, and sets or expires the cookie.
//!
//! [`SessionStore`]: crate::db::handlers::SessionStore

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rand::prelude::RngExt;
use rand::rng;
use sha2::Sha256;
use tracing::{debug, instrument, trace};

use crate::AppState;
use crate::auth::identity::{self, Identity};
use crate::config::SessionConfig;
use crate::db::models::sessions::{SessionData, SessionRecord};
use crate::errors::{Error, Result};
use crate::types::{SessionId, UserId, abbrev_session_id};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies session cookie values.
#[derive(Clone)]
pub struct SessionKey {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret).map_err(|e| Error::Internal {
            operation: format!("create session signing key: {e}"),
        })?;
        Ok(Self { mac })
    }

    /// Produce the cookie value for a session id
    pub fn sign(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!("{id}.{}", URL_SAFE_NO_PAD.encode(tag))
    }

    /// Recover the session id from a cookie value, if the tag is valid.
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, tag) = value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&tag).ok()?;

        Some(id.to_string())
    }
}

/// Generate a new random session id (256 bits, base64url without padding)
pub fn generate_session_id() -> SessionId {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug)]
struct SessionInner {
    id: SessionId,
    data: SessionData,
    expires_at: DateTime<Utc>,
    /// Not yet in the store
    is_new: bool,
    modified: bool,
    destroyed: bool,
    /// Stored id this session was loaded under, when the id has since changed
    rotated_from: Option<SessionId>,
}

/// Handle to the current request's session.
///
/// Cloning is cheap and every clone refers to the same state. The lock is never
/// held across an await.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

/// What the middleware must do with the session once the handler has run
#[derive(Debug, PartialEq)]
enum Commit {
    Unchanged,
    Save {
        record: SessionRecord,
        stale_id: Option<SessionId>,
        set_cookie: bool,
    },
    Destroy {
        ids: Vec<SessionId>,
    },
}

impl Session {
    /// A brand-new, empty session
    pub fn fresh(expires_at: DateTime<Utc>) -> Self {
        Self::with_inner(SessionInner {
            id: generate_session_id(),
            data: SessionData::default(),
            expires_at,
            is_new: true,
            modified: false,
            destroyed: false,
            rotated_from: None,
        })
    }

    pub fn from_record(record: SessionRecord) -> Self {
        Self::with_inner(SessionInner {
            id: record.id,
            data: record.data,
            expires_at: record.expires_at,
            is_new: false,
            modified: false,
            destroyed: false,
            rotated_from: None,
        })
    }

    fn with_inner(inner: SessionInner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.lock().id.clone()
    }

    /// The identity reference stored in the session, unresolved
    pub fn user_id(&self) -> Option<UserId> {
        self.inner.lock().data.user_id
    }

    /// Bind the session to a user and move it to a new id.
    ///
    /// The session bag is carried over; the record under the old id is deleted
    /// when the session is committed.
    pub fn log_in(&self, user_id: UserId) {
        let mut inner = self.inner.lock();
        inner.data.user_id = Some(user_id);
        if !inner.is_new && inner.rotated_from.is_none() {
            inner.rotated_from = Some(inner.id.clone());
        }
        inner.id = generate_session_id();
        inner.modified = true;
    }

    /// Queue a flash message for the next home page render
    pub fn push_message(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.data.messages.push(message.into());
        inner.modified = true;
    }

    /// Drain the flash queue
    pub fn take_messages(&self) -> Vec<String> {
        let mut inner = self.inner.lock();
        if inner.data.messages.is_empty() {
            return Vec::new();
        }
        inner.modified = true;
        std::mem::take(&mut inner.data.messages)
    }

    /// Increment the restricted page counter, returning the new value (1 on first visit)
    pub fn increment_page_count(&self) -> i64 {
        let mut inner = self.inner.lock();
        let count = inner.data.page_count.unwrap_or(0).saturating_add(1);
        inner.data.page_count = Some(count);
        inner.modified = true;
        count
    }

    /// Discard the whole session. The record is deleted and the cookie expired.
    pub fn destroy(&self) {
        self.inner.lock().destroyed = true;
    }

    fn commit(&self) -> Commit {
        let inner = self.inner.lock();

        if inner.destroyed {
            let mut ids = vec![inner.id.clone()];
            ids.extend(inner.rotated_from.clone());
            return Commit::Destroy { ids };
        }

        if !inner.is_new && !inner.modified {
            return Commit::Unchanged;
        }

        Commit::Save {
            record: SessionRecord {
                id: inner.id.clone(),
                data: inner.data.clone(),
                expires_at: inner.expires_at,
            },
            stale_id: inner.rotated_from.clone(),
            set_cookie: inner.is_new || inner.rotated_from.is_some(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| Error::Internal {
            operation: "extract session: session middleware is not installed on this route".to_string(),
        })
    }
}

/// Find the named cookie's value in the request's Cookie headers
pub fn find_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for header_value in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = header_value.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            let cookie = cookie.trim();
            if let Some((name, value)) = cookie.split_once('=') {
                if name == cookie_name {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Build a Set-Cookie value. A `max_age` of zero expires the cookie.
pub fn session_cookie(value: &str, max_age: i64, config: &SessionConfig) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        config.cookie_name,
        value,
        same_site_attribute(&config.cookie_same_site),
        max_age.max(0)
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn same_site_attribute(value: &str) -> &'static str {
    match value.to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}

/// Resolve the session and identity for the request, then persist session changes.
#[instrument(skip_all, fields(session_id = tracing::field::Empty))]
pub async fn session_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response> {
    let session_config = &state.config.session;
    let now = Utc::now();

    let claimed_id = find_cookie(request.headers(), &session_config.cookie_name).and_then(|value| {
        let verified = state.session_key.verify(&value);
        if verified.is_none() {
            debug!("Ignoring session cookie with an invalid signature");
        }
        verified
    });

    let record = match claimed_id {
        Some(id) => state.sessions.load(&id).await?,
        None => None,
    };

    let session = match record {
        Some(record) => Session::from_record(record),
        None => {
            let timeout = TimeDelta::from_std(session_config.timeout).map_err(|e| Error::Internal {
                operation: format!("convert session timeout: {e}"),
            })?;
            trace!("Starting a new session");
            Session::fresh(now + timeout)
        }
    };
    tracing::Span::current().record("session_id", abbrev_session_id(&session.id()).as_str());

    let resolution = identity::resolve(session.user_id(), state.users.as_ref()).await?;
    let identity = Identity::from(resolution);

    request.extensions_mut().insert(session.clone());
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;

    match session.commit() {
        Commit::Unchanged => {}
        Commit::Save {
            record,
            stale_id,
            set_cookie,
        } => {
            if let Some(stale_id) = stale_id {
                state.sessions.delete(&stale_id).await?;
            }
            state.sessions.save(&record).await?;

            if set_cookie {
                let max_age = (record.expires_at - Utc::now()).num_seconds();
                let cookie = session_cookie(&state.session_key.sign(&record.id), max_age, session_config);
                append_set_cookie(&mut response, &cookie)?;
            }
        }
        Commit::Destroy { ids } => {
            for id in &ids {
                state.sessions.delete(id).await?;
            }
            debug!("Session destroyed");
            append_set_cookie(&mut response, &session_cookie("", 0, session_config))?;
        }
    }

    Ok(response)
}

fn append_set_cookie(response: &mut Response, cookie: &str) -> Result<()> {
    let value = HeaderValue::from_str(cookie).map_err(|e| Error::Internal {
        operation: format!("build session cookie header: {e}"),
    })?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}


#[cfg(test)]
mod middleware_tests {
    use crate::api::models::auth::LogInForm;
    use crate::db::handlers::{SessionStore, UserStore};
    use crate::db::models::sessions::{SessionData, SessionRecord};
    use crate::test_utils::{TestClient, create_test_app, register_user};
    use chrono::{Duration, Utc};

    fn alice_login() -> LogInForm {
        LogInForm {
            username: "alice".to_string(),
            password: "pw1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_forged_cookie_gets_fresh_session() {
        let app = create_test_app();
        register_user(&app, "alice", "pw1").await;
        let mut client = TestClient::new(app.router());
        client.post_form("/log-in", &alice_login()).await;
        let real_id = client.session_id(&app).unwrap();

        // Same id, bogus tag
        client.set_cookie(&format!("latchkey.sid={real_id}.AAAA"));
        let response = client.get("/").await;

        assert!(!response.text().contains("Welcome back"));
        let new_id = client.session_id(&app).unwrap();
        assert_ne!(new_id, real_id);
        // The real session is untouched
        assert!(app.sessions.get_raw(&real_id).unwrap().data.user_id.is_some());
    }

    #[tokio::test]
    async fn test_unsigned_garbage_cookie_is_ignored() {
        let app = create_test_app();
        let mut client = TestClient::new(app.router());
        client.set_cookie("latchkey.sid=not-even-close");

        let response = client.get("/").await;
        assert_eq!(response.status_code(), axum::http::StatusCode::OK);
        assert!(client.session_id(&app).is_some());
    }

    #[tokio::test]
    async fn test_expired_session_is_not_loaded() {
        let app = create_test_app();
        let user = register_user(&app, "alice", "pw1").await;
        let mut client = TestClient::new(app.router());

        app.sessions
            .save(&SessionRecord {
                id: "stale-session".to_string(),
                data: SessionData {
                    user_id: Some(user.id),
                    messages: vec![],
                    page_count: Some(9),
                },
                expires_at: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();
        let value = app.state.session_key.sign("stale-session");
        client.set_cookie(&format!("latchkey.sid={value}"));

        let body = client.get("/").await.text();
        assert!(!body.contains("Welcome back"));
        assert_ne!(client.session_id(&app).unwrap(), "stale-session");
    }

    #[tokio::test]
    async fn test_dangling_identity_is_anonymous() {
        let app = create_test_app();
        let user = register_user(&app, "alice", "pw1").await;
        let mut client = TestClient::new(app.router());
        client.post_form("/log-in", &alice_login()).await;
        assert!(client.get("/").await.text().contains("Welcome back alice"));

        // Out-of-band deletion
        assert!(app.users.delete(user.id).await.unwrap());

        let response = client.get("/").await;
        assert_eq!(response.status_code(), axum::http::StatusCode::OK);
        assert!(!response.text().contains("Welcome back"));

        let response = client.get("/restricted").await;
        assert_eq!(response.status_code(), axum::http::StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_cookie_max_age_follows_timeout() {
        let mut config = crate::test_utils::create_test_config();
        config.session.timeout = std::time::Duration::from_secs(3600);
        let app = crate::test_utils::create_test_app_with_config(config);
        let mut client = TestClient::new(app.router());

        let response = client.get("/").await;
        let set_cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();

        assert!(set_cookie.starts_with("latchkey.sid="));
        assert!(set_cookie.contains("HttpOnly"));
        let max_age: i64 = set_cookie
            .split(';')
            .find_map(|attr| attr.trim().strip_prefix("Max-Age="))
            .unwrap()
            .parse()
            .unwrap();
        assert!((3590..=3600).contains(&max_age));
    }
}
