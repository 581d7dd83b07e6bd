//! Form bodies for the authentication routes.

use serde::{Deserialize, Serialize};

/// `POST /sign-up` form. Missing fields arrive as empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /log-in` form. Missing fields arrive as empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
