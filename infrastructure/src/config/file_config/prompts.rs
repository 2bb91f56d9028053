//! Prompt lookup configuration from TOML (`[prompts]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw prompt configuration from TOML
///
/// Relative prompt references are looked up in `dirs` in order, then in
/// the global `devgate/prompts` config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePromptsConfig {
    pub dirs: Vec<PathBuf>,
}

impl Default for FilePromptsConfig {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from(".devgate/prompts")],
        }
    }
}
