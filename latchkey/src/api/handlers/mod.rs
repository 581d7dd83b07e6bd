//! Route handlers.
//!
//! - [`auth`]: sign-up, log-in and log-out
//! - [`pages`]: the home page, the restricted page and the liveness probe
//!
//! Every page route runs inside [`crate::auth::session::session_middleware`],
//! so handlers take [`crate::auth::session::Session`] and
//! [`crate::auth::identity::Identity`] as extractors.

use axum::http::{StatusCode, header};

pub mod auth;
pub mod pages;

/// `302 Found` back to the home page
pub fn redirect_home() -> (StatusCode, [(header::HeaderName, &'static str); 1]) {
    (StatusCode::FOUND, [(header::LOCATION, "/")])
}
