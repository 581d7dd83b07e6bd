//! Credential checks and account creation.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::auth::password::{self, Argon2Params};
use crate::db::handlers::UserStore;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::errors::{Error, Result};

/// A user-facing login failure. The display text is shown to the user verbatim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Missing credentials")]
    MissingCredentials,
    #[error("Incorrect username")]
    IncorrectUsername,
    #[error("Incorrect password")]
    IncorrectPassword,
}

/// Check a username and plaintext password against the credential store.
///
/// The outer result carries infrastructure failures (store unreachable, corrupt
/// hash). The inner result is the login decision. An empty username or password
/// fails without consulting the store.
#[instrument(skip_all, fields(username = %username), err)]
pub async fn authenticate(
    users: &dyn UserStore,
    username: &str,
    password: &str,
) -> Result<std::result::Result<UserDBResponse, AuthFailure>> {
    if username.is_empty() || password.is_empty() {
        debug!("Username or password missing");
        return Ok(Err(AuthFailure::MissingCredentials));
    }

    let Some(user) = users.get_by_username(username).await? else {
        debug!("No user with that username");
        return Ok(Err(AuthFailure::IncorrectUsername));
    };

    // Verify password on a blocking thread to avoid blocking async runtime
    let password = password.to_string();
    let hash = user.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        debug!("Password mismatch");
        return Ok(Err(AuthFailure::IncorrectPassword));
    }

    Ok(Ok(user))
}

/// Hash the password and create a new user. Duplicate usernames are not checked.
///
/// Both fields are required; an empty one is a [`Error::BadRequest`].
#[instrument(skip_all, fields(username = %username), err)]
pub async fn register(users: &dyn UserStore, username: &str, password: &str, params: Argon2Params) -> Result<UserDBResponse> {
    if username.is_empty() {
        return Err(Error::BadRequest {
            message: "Username is required".to_string(),
        });
    }
    if password.is_empty() {
        return Err(Error::BadRequest {
            message: "Password is required".to_string(),
        });
    }

    // Hash the password on a blocking thread to avoid blocking async runtime
    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let create_request = UserCreateDBRequest {
        username: username.to_string(),
        password_hash,
    };

    Ok(users.create(&create_request).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::InMemoryUsers;
    use crate::test_utils::test_argon2_params;

    #[tokio::test]
    async fn test_registered_credentials_authenticate() {
        let users = InMemoryUsers::new();
        let pairs = [("alice", "pw1"), ("bob", "correct horse"), (" ", " "), ("ünïcødé", "pässwörd")];

        for (username, password) in pairs {
            let created = register(&users, username, password, test_argon2_params()).await.unwrap();
            assert_ne!(created.password_hash, password);

            let user = authenticate(&users, username, password).await.unwrap().unwrap();
            assert_eq!(user.id, created.id);
        }
    }

    #[tokio::test]
    async fn test_wrong_password_is_incorrect_password() {
        let users = InMemoryUsers::new();
        register(&users, "alice", "pw1", test_argon2_params()).await.unwrap();

        let result = authenticate(&users, "alice", "wrong").await.unwrap();
        assert_eq!(result.unwrap_err(), AuthFailure::IncorrectPassword);
    }

    #[tokio::test]
    async fn test_unknown_username_is_incorrect_username() {
        let users = InMemoryUsers::new();
        register(&users, "alice", "pw1", test_argon2_params()).await.unwrap();

        let result = authenticate(&users, "mallory", "pw1").await.unwrap();
        assert_eq!(result.unwrap_err(), AuthFailure::IncorrectUsername);
    }

    #[tokio::test]
    async fn test_failure_texts_are_distinct() {
        assert_eq!(AuthFailure::IncorrectUsername.to_string(), "Incorrect username");
        assert_eq!(AuthFailure::IncorrectPassword.to_string(), "Incorrect password");
        assert_eq!(AuthFailure::MissingCredentials.to_string(), "Missing credentials");
    }

    #[tokio::test]
    async fn test_empty_fields_are_missing_credentials() {
        let users = InMemoryUsers::new();
        users
            .create(&UserCreateDBRequest {
                username: "".to_string(),
                password_hash: "garbage".to_string(),
            })
            .await
            .unwrap();

        // The corrupt record would be an infrastructure error if it were looked up
        for (username, password) in [("", ""), ("", "pw1"), ("alice", "")] {
            let result = authenticate(&users, username, password).await.unwrap();
            assert_eq!(result.unwrap_err(), AuthFailure::MissingCredentials);
        }
    }

    #[tokio::test]
    async fn test_register_rejects_empty_fields() {
        let users = InMemoryUsers::new();

        let err = register(&users, "", "pw1", test_argon2_params()).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert_eq!(err.to_string(), "Username is required");

        let err = register(&users, "alice", "", test_argon2_params()).await.unwrap_err();
        assert_eq!(err.to_string(), "Password is required");

        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_registration_earliest_wins() {
        let users = InMemoryUsers::new();
        let first = register(&users, "dup", "first", test_argon2_params()).await.unwrap();
        let second = register(&users, "dup", "second", test_argon2_params()).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(users.len(), 2);

        let user = authenticate(&users, "dup", "first").await.unwrap().unwrap();
        assert_eq!(user.id, first.id);

        // The later record's password never matches, since the earlier record shadows it
        let result = authenticate(&users, "dup", "second").await.unwrap();
        assert_eq!(result.unwrap_err(), AuthFailure::IncorrectPassword);
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_infrastructure_error() {
        let users = InMemoryUsers::new();
        users
            .create(&UserCreateDBRequest {
                username: "broken".to_string(),
                password_hash: "garbage".to_string(),
            })
            .await
            .unwrap();

        assert!(authenticate(&users, "broken", "anything").await.is_err());
    }
}
