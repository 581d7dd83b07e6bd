//! Persistence for users and sessions.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (route handlers, session middleware)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Stores    │  (db::handlers - UserStore / SessionStore)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - records)
//! └──────┬──────┘
//!        ↓
//!   PostgreSQL, or memory in tests
//! ```
//!
//! - [`handlers`]: store traits and their PostgreSQL and in-memory implementations
//! - [`models`]: record structures matching the table schemas
//! - [`errors`]: store error type

pub mod errors;
pub mod handlers;
pub mod models;
