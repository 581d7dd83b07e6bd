//! Store traits and implementations.
//!
//! - [`UserStore`]: the credential store ([`PgUsers`], [`InMemoryUsers`])
//! - [`SessionStore`]: the session store ([`PgSessions`], [`InMemorySessions`])

pub mod in_memory;
pub mod sessions;
pub mod users;

pub use in_memory::{InMemorySessions, InMemoryUsers};
pub use sessions::{PgSessions, SessionStore};
pub use users::{PgUsers, UserStore};
