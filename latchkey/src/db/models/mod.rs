//! Database record structures for the credential and session stores.

pub mod sessions;
pub mod users;
