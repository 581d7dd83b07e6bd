//! # latchkey
//!
//! A small web application with username/password registration, login,
//! session-backed access control and one restricted page that counts visits per
//! session.
//!
//! ## Architecture
//!
//! - **Stores** ([`db`]): the credential store ([`db::handlers::UserStore`]) and the
//!   session store ([`db::handlers::SessionStore`]), each with a PostgreSQL and an
//!   in-memory implementation
//! - **Auth** ([`auth`]): password hashing, the authenticator, signed session
//!   cookies with server-side session records, identity resolution and the
//!   access guard
//! - **HTTP** ([`api`]): axum handlers for the pages and form posts
//! - **Views** ([`views`]): minijinja templates compiled into the binary
//!
//! ## Request flow
//!
//! Every page request passes through [`auth::session::session_middleware`], which
//! loads (or starts) the session and resolves the current [`auth::identity::Identity`].
//! `/restricted` additionally runs [`auth::guard::require_login`]. After the
//! handler returns, modified sessions are written back and the cookie is set or
//! expired.
//!
//! ## Background services
//!
//! A reaper task deletes expired session records every `session.reap_interval`.
//! It stops when the application shuts down.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
mod errors;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
mod types;
pub mod views;

use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, warn};

use crate::api::handlers::{auth as auth_handlers, pages};
use crate::auth::{guard::require_login, session::SessionKey, session::session_middleware};
use crate::db::handlers::{PgSessions, PgUsers, SessionStore, UserStore};
use crate::views::Views;

pub use config::Config;
pub use errors::{Error, Result};
pub use types::{SessionId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .users(Arc::new(PgUsers::new(pool.clone())))
///     .sessions(Arc::new(PgSessions::new(pool)))
///     .views(Arc::new(Views::new()?))
///     .session_key(SessionKey::new(secret.as_bytes())?)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub views: Arc<Views>,
    pub session_key: SessionKey,
}

/// Get the latchkey database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the application router.
///
/// Page routes share the session middleware; `/healthz` sits outside it so
/// probes never create sessions.
pub fn build_router(state: AppState) -> Router {
    let restricted = Router::new()
        .route("/restricted", get(pages::restricted))
        .route_layer(from_fn(require_login));

    let page_routes = Router::new()
        .route("/", get(pages::home))
        .route("/sign-up", get(auth_handlers::sign_up_form).post(auth_handlers::sign_up))
        .route("/log-in", axum::routing::post(auth_handlers::log_in))
        .route("/log-out", get(auth_handlers::log_out))
        .merge(restricted)
        .route_layer(from_fn_with_state(state.clone(), session_middleware));

    let router = Router::new().route("/healthz", get(pages::healthz)).merge(page_routes);

    // Add tracing layer
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Container for background tasks and their lifecycle.
///
/// Currently only the session reaper runs here.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
}

impl BackgroundServices {
    /// Start all background tasks
    pub fn start(sessions: Arc<dyn SessionStore>, config: &Config, shutdown_token: CancellationToken) -> Self {
        let mut background_tasks = Vec::new();

        let reap_interval = config.session.reap_interval;
        let token = shutdown_token.clone();
        let handle = tokio::spawn(async move {
            info!(interval = ?reap_interval, "Starting session reaper");
            run_session_reaper(sessions, reap_interval, token).await;
        });
        background_tasks.push(handle);

        Self {
            background_tasks,
            shutdown_token,
        }
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        // Signal all background tasks to shutdown
        self.shutdown_token.cancel();

        // Wait for all background tasks to complete
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Delete expired session records every `interval` until cancelled.
///
/// Failures are logged and retried on the next tick.
pub async fn run_session_reaper(sessions: Arc<dyn SessionStore>, interval: std::time::Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Session reaper shutting down");
                break;
            }
            _ = ticker.tick() => {
                match sessions.delete_expired().await {
                    Ok(0) => {}
                    Ok(count) => info!(count, "Reaped expired sessions"),
                    Err(e) => warn!("Failed to reap expired sessions: {:#}", e),
                }
            }
        }
    }
}

/// Connect to PostgreSQL and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let url = config.database_url.as_deref().context("database_url is not configured")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout)
        .connect(url)
        .await
        .context("connect to database")?;

    migrator().run(&pool).await.context("run database migrations")?;
    info!("Database migrations applied");

    Ok(pool)
}

/// The assembled application: router, store connections and background services
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(
            host = %config.host,
            port = config.port,
            session = ?config.session,
            "Starting latchkey"
        );

        let pool = setup_database(&config).await?;

        let secret = config.session_secret.as_deref().context("session_secret is not configured")?;
        let session_key = SessionKey::new(secret.as_bytes())?;

        let users: Arc<dyn UserStore> = Arc::new(PgUsers::new(pool.clone()));
        let sessions: Arc<dyn SessionStore> = Arc::new(PgSessions::new(pool.clone()));

        // Create a shutdown token for coordinating graceful shutdown of background tasks
        let shutdown_token = CancellationToken::new();
        let bg_services = BackgroundServices::start(sessions.clone(), &config, shutdown_token);

        let state = AppState::builder()
            .config(config.clone())
            .users(users)
            .sessions(sessions)
            .views(Arc::new(Views::new()?))
            .session_key(session_key)
            .build();

        let router = build_router(state);

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("latchkey listening on http://{}", bind_addr);

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        // Close database connections
        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
