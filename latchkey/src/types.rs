//! Common type definitions.

use uuid::Uuid;

pub type UserId = Uuid;

/// Opaque session identifier, carried in the signed session cookie.
pub type SessionId = String;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Abbreviate a session id for logs. Full ids are bearer credentials.
pub fn abbrev_session_id(id: &str) -> String {
    id.chars().take(8).collect()
}
