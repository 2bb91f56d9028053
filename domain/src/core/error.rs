//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// `UnknownRole` and `InvalidWorkflow` are configuration errors and are
/// expected to surface during startup validation. `MalformedHandle` is
/// recoverable by invalidating the handle. `OutOfOrderCheckpoint` rejects the
/// calling request without touching the workflow instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid role '{role}': {reason}")]
    InvalidRole { role: String, reason: String },

    #[error("Unknown checkpoint label: {0}")]
    UnknownCheckpoint(String),

    #[error("Malformed conversation handle for role '{role}': {reason}")]
    MalformedHandle { role: String, reason: String },

    #[error(
        "Checkpoint {requested} requested out of order (workflow is at checkpoint {current})"
    )]
    OutOfOrderCheckpoint { requested: String, current: String },

    #[error("Workflow {instance} is {status}; no further transitions are allowed")]
    WorkflowClosed { instance: String, status: String },

    #[error("Checkpoint {label} cannot be skipped: {reason}")]
    SkipNotPermitted { label: String, reason: String },

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),
}

impl DomainError {
    /// Configuration errors are fatal at startup; everything else is scoped
    /// to a single request.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DomainError::UnknownRole(_)
                | DomainError::InvalidRole { .. }
                | DomainError::InvalidWorkflow(_)
        )
    }

    /// Check if this error can be recovered from by retrying with a fresh handle
    pub fn is_malformed_handle(&self) -> bool {
        matches!(self, DomainError::MalformedHandle { .. })
    }
}
