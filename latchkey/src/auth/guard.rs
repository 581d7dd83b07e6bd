//! Access guard for pages that require a logged-in user.

use axum::{
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::identity::Identity;
use crate::auth::session::Session;

/// Flash text queued when an anonymous client is turned away
pub const LOGON_REQUIRED_MESSAGE: &str = "You can't access that page before logon.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Continue,
    Redirect(&'static str),
}

/// Let authenticated clients through. Anonymous clients get a flash message
/// and are sent home.
pub fn guard(identity: &Identity, session: &Session) -> GuardOutcome {
    match identity {
        Identity::Authenticated(_) => GuardOutcome::Continue,
        Identity::Anonymous => {
            session.push_message(LOGON_REQUIRED_MESSAGE);
            GuardOutcome::Redirect("/")
        }
    }
}

/// Middleware form of [`guard`]. Must run inside the session middleware.
pub async fn require_login(session: Session, identity: Identity, request: Request, next: Next) -> Response {
    match guard(&identity, &session) {
        GuardOutcome::Continue => next.run(request).await,
        GuardOutcome::Redirect(location) => {
            debug!(path = %request.uri().path(), "Anonymous access to restricted page");
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
    }
}
