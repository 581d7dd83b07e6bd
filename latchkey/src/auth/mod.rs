//! Authentication and access control.
//!
//! - [`password`]: argon2 hashing and verification
//! - [`authenticator`]: `authenticate` and `register` against the credential store
//! - [`session`]: signed session cookies, the per-request [`session::Session`]
//!   handle and the middleware that loads and persists it
//! - [`identity`]: resolving a session's user reference into an [`identity::Identity`]
//! - [`guard`]: the `require_login` middleware for restricted pages
//!
//! # Request flow
//!
//! ```text
//! cookie ─► verify signature ─► load session ─► resolve identity ─► guard ─► handler
//!                                                                              │
//!                          set/expire cookie ◄─ save/delete session ◄──────────┘
//! ```

pub mod authenticator;
pub mod guard;
pub mod identity;
pub mod password;
pub mod session;
