//! Infrastructure layer for devgate
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the agent launcher, prompt files, workflow
//! state and the audit log, plus configuration file loading.

pub mod config;
pub mod launcher;
pub mod logging;
pub mod prompts;
pub mod state;

// Re-export commonly used types
pub use config::{ConfigLoader, ConfigValidationError, FileConfig, GateSetup};
pub use launcher::{
    error::{LauncherError, Result},
    transport::{LauncherConfig, LauncherTransport},
};
pub use logging::JsonlConversationLogger;
pub use prompts::FilePromptSource;
pub use state::JsonWorkflowStore;
