//! HTTP layer.
//!
//! - **[`handlers`]**: axum route handlers for the pages and form posts
//! - **[`models`]**: form bodies and view models
//!
//! | Method | Path          | Handler                         |
//! |--------|---------------|---------------------------------|
//! | GET    | `/`           | [`handlers::pages::home`]       |
//! | GET    | `/sign-up`    | [`handlers::auth::sign_up_form`]|
//! | POST   | `/sign-up`    | [`handlers::auth::sign_up`]     |
//! | POST   | `/log-in`     | [`handlers::auth::log_in`]      |
//! | GET    | `/log-out`    | [`handlers::auth::log_out`]     |
//! | GET    | `/restricted` | [`handlers::pages::restricted`] |
//! | GET    | `/healthz`    | [`handlers::pages::healthz`]    |

pub mod handlers;
pub mod models;
