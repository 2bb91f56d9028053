//! Workflow persistence port
//!
//! Lets successive CLI invocations continue the same workflow instance and
//! the same conversation handles.

use async_trait::async_trait;
use devgate_domain::{ConversationHandle, Millis, WorkflowInstance};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored workflow is corrupt: {0}")]
    Corrupt(String),
}

/// Everything needed to resume a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub instance: WorkflowInstance,
    #[serde(default)]
    pub handles: Vec<ConversationHandle>,
    pub saved_at: Millis,
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn load(&self) -> Result<Option<WorkflowSnapshot>, RepositoryError>;

    async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<(), RepositoryError>;

    /// Remove any stored workflow. Succeeds when nothing is stored.
    async fn clear(&self) -> Result<(), RepositoryError>;
}
