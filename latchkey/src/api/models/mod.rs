//! Request and view data models.
//!
//! These are distinct from the database models in [`crate::db::models`]: forms
//! are what browsers post, and [`users::CurrentUser`] is the only user shape
//! that reaches a template.

pub mod auth;
pub mod users;
