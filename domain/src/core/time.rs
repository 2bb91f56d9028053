//! Wall-clock helpers.
//!
//! Timestamps in the domain are plain milliseconds since the Unix epoch so
//! that entities stay serializable without pulling in a date library.

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Current wall-clock time in milliseconds.
pub fn current_timestamp() -> Millis {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
