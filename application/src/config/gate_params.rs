//! Gate parameters for the scheduler and session store.
//!
//! [`GateParams`] groups the static parameters that control how the
//! [`CheckpointScheduler`](crate::use_cases::checkpoint_scheduler::CheckpointScheduler)
//! and the [`SessionStore`](crate::session_store::SessionStore) behave.
//! These are application-layer concerns, not domain policy.

use devgate_domain::TokenFormat;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GateParams {
    /// Accepted conversation identifier shape
    pub token_format: TokenFormat,
    /// Idle lifetime of a conversation handle
    pub idle_ttl: Duration,
    /// Revision used when the caller does not name one
    pub default_revision: String,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            token_format: TokenFormat::default(),
            idle_ttl: Duration::from_secs(86_400),
            default_revision: "working-tree".to_string(),
        }
    }
}

impl GateParams {
    // ==================== Builder Methods ====================

    pub fn with_token_format(mut self, format: TokenFormat) -> Self {
        self.token_format = format;
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    pub fn with_default_revision(mut self, revision: impl Into<String>) -> Self {
        self.default_revision = revision.into();
        self
    }
}
