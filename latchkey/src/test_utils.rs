//! Test utilities: an in-memory application and a cookie-tracking HTTP client.

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, header},
};
use axum_test::{TestResponse, TestServer};
use serde::Serialize;

use crate::auth::{authenticator, password::Argon2Params, session::SessionKey};
use crate::config::Config;
use crate::db::errors::{DbError, Result as DbResult};
use crate::db::handlers::{InMemorySessions, InMemoryUsers, SessionStore, UserStore};
use crate::db::models::{
    sessions::SessionRecord,
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{SessionId, UserId};
use crate::views::Views;
use crate::{AppState, build_router};

pub const TEST_SESSION_SECRET: &str = "an-adequately-long-session-secret-for-tests";

/// Weak argon2 parameters so tests hash quickly
pub fn test_argon2_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        database_url: Some("postgres://localhost/latchkey_test".to_string()),
        session_secret: Some(TEST_SESSION_SECRET.to_string()),
        ..Default::default()
    };
    let params = test_argon2_params();
    config.password.argon2_memory_kib = params.memory_kib;
    config.password.argon2_iterations = params.iterations;
    config.password.argon2_parallelism = params.parallelism;
    config
}

/// Application state backed by in-memory stores, with handles to inspect them
pub struct TestApp {
    pub state: AppState,
    pub users: InMemoryUsers,
    pub sessions: InMemorySessions,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with_config(create_test_config())
}

pub fn create_test_app_with_config(config: Config) -> TestApp {
    let users = InMemoryUsers::new();
    let sessions = InMemorySessions::new();
    let state = create_test_state(config, Arc::new(users.clone()), Arc::new(sessions.clone()));

    TestApp { state, users, sessions }
}

pub fn create_test_state(config: Config, users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>) -> AppState {
    let secret = config.session_secret.clone().expect("test config has a session secret");

    AppState::builder()
        .config(config)
        .users(users)
        .sessions(sessions)
        .views(Arc::new(Views::new().expect("templates compile")))
        .session_key(SessionKey::new(secret.as_bytes()).expect("valid session key"))
        .build()
}

fn store_unavailable() -> DbError {
    DbError::Other(anyhow::anyhow!("connection refused"))
}

/// A credential store whose every call fails as if the database were down
#[derive(Debug, Clone, Default)]
pub struct FailingUsers;

#[async_trait::async_trait]
impl UserStore for FailingUsers {
    async fn create(&self, _request: &UserCreateDBRequest) -> DbResult<UserDBResponse> {
        Err(store_unavailable())
    }

    async fn get_by_id(&self, _id: UserId) -> DbResult<Option<UserDBResponse>> {
        Err(store_unavailable())
    }

    async fn get_by_username(&self, _username: &str) -> DbResult<Option<UserDBResponse>> {
        Err(store_unavailable())
    }

    async fn delete(&self, _id: UserId) -> DbResult<bool> {
        Err(store_unavailable())
    }
}

/// A session store whose every call fails as if the database were down
#[derive(Debug, Clone, Default)]
pub struct FailingSessions;

#[async_trait::async_trait]
impl SessionStore for FailingSessions {
    async fn load(&self, _id: &str) -> DbResult<Option<SessionRecord>> {
        Err(store_unavailable())
    }

    async fn save(&self, _record: &SessionRecord) -> DbResult<()> {
        Err(store_unavailable())
    }

    async fn delete(&self, _id: &str) -> DbResult<bool> {
        Err(store_unavailable())
    }

    async fn delete_expired(&self) -> DbResult<u64> {
        Err(store_unavailable())
    }
}

pub async fn register_user(app: &TestApp, username: &str, password: &str) -> UserDBResponse {
    authenticator::register(&app.users, username, password, test_argon2_params())
        .await
        .expect("Failed to register test user")
}

/// HTTP client that behaves like a browser with respect to one cookie jar entry:
/// it stores the session cookie from `Set-Cookie` and sends it back.
pub struct TestClient {
    server: TestServer,
    /// `name=value`
    cookie: Option<String>,
}

impl TestClient {
    pub fn new(router: Router) -> Self {
        Self {
            server: TestServer::new(router).expect("Failed to create test server"),
            cookie: None,
        }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let mut request = self.server.get(path);
        if let Some(cookie) = &self.cookie {
            request = request.add_header(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        let response = request.await;
        self.track(&response);
        response
    }

    pub async fn post_form<T: Serialize + ?Sized>(&mut self, path: &str, form: &T) -> TestResponse {
        let mut request = self.server.post(path).form(form);
        if let Some(cookie) = &self.cookie {
            request = request.add_header(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        let response = request.await;
        self.track(&response);
        response
    }

    fn track(&mut self, response: &TestResponse) {
        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let set_cookie = set_cookie.to_str().unwrap();
            let pair = set_cookie.split(';').next().unwrap().trim().to_string();
            let expired = set_cookie.split(';').any(|attr| attr.trim() == "Max-Age=0");
            self.cookie = if expired { None } else { Some(pair) };
        }
    }

    /// The tracked cookie as `name=value`
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Replace the tracked cookie (`name=value`)
    pub fn set_cookie(&mut self, cookie: &str) {
        self.cookie = Some(cookie.to_string());
    }

    /// The session id carried by the tracked cookie, if its signature verifies
    pub fn session_id(&self, app: &TestApp) -> Option<SessionId> {
        let (_, value) = self.cookie.as_deref()?.split_once('=')?;
        app.state.session_key.verify(value)
    }
}
