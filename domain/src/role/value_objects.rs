//! Role value objects

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a registered consultation role (Value Object)
///
/// Lowercase ASCII letters, digits, `-` and `_`. Identifiers are compared
/// case-sensitively after normalization to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(String);

impl RoleId {
    pub const ARCHITECT: &'static str = "architect";
    pub const REVIEWER: &'static str = "reviewer";
    pub const TROUBLESHOOTER: &'static str = "troubleshooter";

    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into().trim().to_lowercase();
        if id.is_empty() {
            return Err(DomainError::InvalidRole {
                role: id,
                reason: "role identifier cannot be empty".to_string(),
            });
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidRole {
                reason: "role identifier may only contain letters, digits, '-' and '_'"
                    .to_string(),
                role: id,
            });
        }
        Ok(Self(id))
    }

    pub fn architect() -> Self {
        Self(Self::ARCHITECT.to_string())
    }

    pub fn reviewer() -> Self {
        Self(Self::REVIEWER.to_string())
    }

    pub fn troubleshooter() -> Self {
        Self(Self::TROUBLESHOOTER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoleId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoleId::new(value)
    }
}

impl From<RoleId> for String {
    fn from(id: RoleId) -> Self {
        id.0
    }
}

impl FromStr for RoleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleId::new(s)
    }
}

/// Reference to the role's prompt text (a path or key understood by the
/// prompt source). The domain never reads prompt contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRef(String);

impl PromptRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reasoning effort requested from the external agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    #[default]
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }

    pub fn valid_values() -> &'static [&'static str] {
        &["low", "medium", "high"]
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(ReasoningEffort::Low),
            "medium" | "med" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(format!("unknown reasoning effort: {}", other)),
        }
    }
}

/// Sandbox permission level granted to the external agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    /// Read-only inspection of the workspace (full-disk read access)
    #[default]
    ReadOnly,
    /// Writes limited to the workspace
    WorkspaceWrite,
}

impl SandboxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxMode::ReadOnly => "read-only",
            SandboxMode::WorkspaceWrite => "workspace-write",
        }
    }

    pub fn valid_values() -> &'static [&'static str] {
        &["read-only", "workspace-write"]
    }
}

impl fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "read-only" | "readonly" => Ok(SandboxMode::ReadOnly),
            "workspace-write" => Ok(SandboxMode::WorkspaceWrite),
            other => Err(format!("unknown sandbox mode: {}", other)),
        }
    }
}

/// Execution profile for the external agent process (opaque to the core)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionProfile {
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
    pub sandbox: SandboxMode,
}

impl Default for ExecutionProfile {
    fn default() -> Self {
        Self {
            model: "gpt-5-codex".to_string(),
            reasoning_effort: ReasoningEffort::High,
            sandbox: SandboxMode::ReadOnly,
        }
    }
}

impl ExecutionProfile {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = effort;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxMode) -> Self {
        self.sandbox = sandbox;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_id_normalizes_case() {
        let id = RoleId::new("  Reviewer ").unwrap();
        assert_eq!(id.as_str(), "reviewer");
        assert_eq!(id, RoleId::reviewer());
    }

    #[test]
    fn test_role_id_rejects_empty_and_symbols() {
        assert!(RoleId::new("").is_err());
        assert!(RoleId::new("   ").is_err());
        assert!(RoleId::new("code review").is_err());
        assert!(RoleId::new("sec/ops").is_err());
        assert!(RoleId::new("sec-ops_2").is_ok());
    }

    #[test]
    fn test_role_id_serde_validates() {
        let id: RoleId = serde_json::from_str("\"architect\"").unwrap();
        assert_eq!(id, RoleId::architect());
        assert!(serde_json::from_str::<RoleId>("\"not valid\"").is_err());
    }

    #[test]
    fn test_reasoning_effort_parse() {
        assert_eq!("HIGH".parse::<ReasoningEffort>(), Ok(ReasoningEffort::High));
        assert_eq!("med".parse::<ReasoningEffort>(), Ok(ReasoningEffort::Medium));
        assert!("extreme".parse::<ReasoningEffort>().is_err());
    }

    #[test]
    fn test_sandbox_mode_parse_and_display() {
        assert_eq!("read_only".parse::<SandboxMode>(), Ok(SandboxMode::ReadOnly));
        assert_eq!(
            "workspace-write".parse::<SandboxMode>(),
            Ok(SandboxMode::WorkspaceWrite)
        );
        assert_eq!(SandboxMode::ReadOnly.to_string(), "read-only");
    }

    #[test]
    fn test_default_profile_is_read_only_high_effort() {
        let profile = ExecutionProfile::default();
        assert_eq!(profile.sandbox, SandboxMode::ReadOnly);
        assert_eq!(profile.reasoning_effort, ReasoningEffort::High);
    }
}
