//! Prefixed session ID generation.
//!
//! Session IDs are `ses_` followed by a UUIDv7 (time-ordered), so a stale
//! session scanned from an old screen sorts before the current one and is
//! recognisable in logs at a glance.

use uuid::Uuid;

/// Prefix shared by every session ID.
pub const SESSION_PREFIX: &str = "ses";

fn prefixed_id(prefix: &str) -> String {
    let id = Uuid::now_v7();
    format!("{}_{}", prefix, id.as_simple())
}

/// Generate a session ID: `ses_<uuid7>`
pub fn session_id() -> String {
    prefixed_id(SESSION_PREFIX)
}
