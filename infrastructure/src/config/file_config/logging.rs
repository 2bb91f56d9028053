//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};

/// Raw logging configuration from TOML
///
/// # Example
///
/// ```toml
/// [logging]
/// file = true     # rolling diagnostic log under <state_dir>/logs
/// audit = true    # JSONL transcript of every consultation
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Write diagnostics to a daily rolling file
    pub file: bool,
    /// Write the structured audit log
    pub audit: bool,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            file: false,
            audit: true,
        }
    }
}
