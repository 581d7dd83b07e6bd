//! Identity resolution: from a session's stored user reference to the current user.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument};

use crate::api::models::users::CurrentUser;
use crate::db::handlers::UserStore;
use crate::db::models::users::UserDBResponse;
use crate::errors::{Error, Result};
use crate::types::{UserId, abbrev_uuid};

/// Who the current request is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(CurrentUser),
}

impl Identity {
    pub fn current_user(&self) -> Option<&CurrentUser> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

/// Outcome of looking up a session's user reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The session carries no user reference
    NoIdentity,
    Found(UserDBResponse),
    /// The session references a user that no longer exists
    Dangling(UserId),
}

impl From<Resolution> for Identity {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::NoIdentity => Identity::Anonymous,
            Resolution::Found(user) => Identity::Authenticated(user.into()),
            Resolution::Dangling(user_id) => {
                debug!(user_id = %abbrev_uuid(&user_id), "Session references a missing user, treating as anonymous");
                Identity::Anonymous
            }
        }
    }
}

/// Re-fetch the referenced user. Nothing is cached between requests.
#[instrument(skip(users), err)]
pub async fn resolve(user_id: Option<UserId>, users: &dyn UserStore) -> Result<Resolution> {
    let Some(user_id) = user_id else {
        return Ok(Resolution::NoIdentity);
    };

    Ok(match users.get_by_id(user_id).await? {
        Some(user) => Resolution::Found(user),
        None => Resolution::Dangling(user_id),
    })
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| Error::Internal {
            operation: "extract identity: session middleware is not installed on this route".to_string(),
        })
    }
}
