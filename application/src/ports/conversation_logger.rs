//! Port for the structured audit log.
//!
//! Defines the [`ConversationLogger`] trait for recording orchestration events
//! (agent exchanges, checkpoint outcomes, handle invalidations, aborts) to a
//! structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the full
//! consultation transcript in a machine-readable format (JSONL).

use serde_json::Value;

/// A structured audit event.
///
/// Each event has a type string and a JSON payload containing event-specific
/// fields. The adapter adds the timestamp.
pub struct ConversationEvent {
    /// Event type identifier (e.g., "agent_exchange", "checkpoint_outcome").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging audit events to a structured log.
///
/// Implementations write each event as a single record (e.g., one JSONL line).
/// The `log` method is synchronous and non-fallible so that a broken log
/// never changes a workflow outcome.
pub trait ConversationLogger: Send + Sync {
    /// Record an event.
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
