//! Prompt source port
//!
//! Role prompt text is stored outside the core; the core only holds a
//! [`PromptRef`] and asks this port for the text when a fresh conversation
//! starts.

use async_trait::async_trait;
use devgate_domain::PromptRef;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptSourceError {
    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Failed to read prompt {reference}: {message}")]
    Io { reference: String, message: String },
}

#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn load(&self, reference: &PromptRef) -> Result<String, PromptSourceError>;
}
