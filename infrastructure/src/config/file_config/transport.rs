//! Launcher configuration from TOML (`[transport]` section)

use devgate_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw transport configuration from TOML
///
/// # Example
///
/// ```toml
/// [transport]
/// command = "codex-launcher"
/// args = ["exec", "--json"]
/// workdir = "."
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTransportConfig {
    /// Launcher executable (name on PATH or a path)
    pub command: String,
    /// Arguments placed before the per-request flags
    pub args: Vec<String>,
    /// Directory the agent inspects; defaults to the current directory
    pub workdir: Option<PathBuf>,
}

impl Default for FileTransportConfig {
    fn default() -> Self {
        Self {
            command: "devgate-agent".to_string(),
            args: Vec::new(),
            workdir: None,
        }
    }
}

impl FileTransportConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        if self.command.trim().is_empty() {
            return vec![ConfigIssue::error(
                ConfigIssueCode::EmptyField {
                    field: "transport.command".to_string(),
                },
                "transport.command: launcher command cannot be empty",
            )];
        }
        Vec::new()
    }
}
