//! Configuration file loading for devgate
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `DEVGATE_` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./devgate.toml` or `./.devgate.toml`
//! 4. Global: `$XDG_CONFIG_HOME/devgate/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileLoggingConfig, FileOutputConfig, FilePromptsConfig,
    FileRoleConfig, FileSessionConfig, FileTransportConfig, FileWorkflowConfig, GateSetup,
    standard_roles,
};
pub use loader::ConfigLoader;
