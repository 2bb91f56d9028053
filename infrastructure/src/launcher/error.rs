//! Error types for the launcher adapter

use devgate_application::TransportError;
use thiserror::Error;

/// Result type alias for launcher operations
pub type Result<T> = std::result::Result<T, LauncherError>;

/// Errors that can occur when running the agent launcher
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Launcher command '{0}' not found on PATH")]
    CommandNotFound(String),

    #[error("Failed to spawn launcher process: {0}")]
    SpawnError(#[from] std::io::Error),

    #[error("Launcher exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("Agent reported an error: {0}")]
    AgentReported(String),

    #[error("Launcher produced no response text")]
    EmptyResponse,

    #[error("Unreadable launcher output: {0}")]
    Protocol(String),
}

impl From<LauncherError> for TransportError {
    fn from(e: LauncherError) -> Self {
        match e {
            LauncherError::CommandNotFound(_) | LauncherError::SpawnError(_) => {
                TransportError::Unreachable(e.to_string())
            }
            LauncherError::ProcessFailed { .. } => TransportError::ProcessFailed(e.to_string()),
            LauncherError::AgentReported(message) => TransportError::AgentReported(message),
            LauncherError::EmptyResponse => TransportError::EmptyResponse,
            LauncherError::Protocol(message) => TransportError::Protocol(message),
        }
    }
}
