//! Conversation session configuration from TOML (`[session]` section)

use devgate_domain::{ConfigIssue, ConfigIssueCode, TokenFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw session configuration from TOML
///
/// # Example
///
/// ```toml
/// [session]
/// token_schemes = ["conv_", "thread_"]
/// idle_ttl_secs = 86400
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    /// Recognized conversation identifier prefixes
    pub token_schemes: Vec<String>,
    /// Idle lifetime of a conversation handle
    pub idle_ttl_secs: u64,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        Self {
            token_schemes: TokenFormat::DEFAULT_SCHEMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            idle_ttl_secs: 86_400,
        }
    }
}

impl FileSessionConfig {
    pub fn token_format(&self) -> TokenFormat {
        TokenFormat::new(self.token_schemes.iter().cloned())
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.token_schemes.is_empty() || self.token_schemes.iter().any(|s| s.is_empty()) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyField {
                    field: "session.token_schemes".to_string(),
                },
                "session.token_schemes: at least one non-empty scheme prefix is required",
            ));
        }
        if self.idle_ttl_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: "session.idle_ttl_secs".to_string(),
                },
                "session.idle_ttl_secs cannot be 0",
            ));
        }
        issues
    }
}
