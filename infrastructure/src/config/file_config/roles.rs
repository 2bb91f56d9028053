//! Role configuration from TOML (`[roles.<id>]` sections)

use devgate_domain::{
    CheckpointLabel, ConfigIssue, ConfigIssueCode, ExecutionProfile, PromptRef, ReasoningEffort,
    Role, RoleId, RoleMarkers, SandboxMode,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Raw role configuration from TOML
///
/// # Example
///
/// ```toml
/// [roles.reviewer]
/// prompt = "reviewer.md"
/// checkpoints = ["T", "T+1", "L-1"]
/// model = "gpt-5-codex"
/// reasoning_effort = "high"
/// sandbox = "read-only"
/// max_latency_secs = 600
///
/// [roles.reviewer.markers]
/// blocked = ["NEEDS REDESIGN"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRoleConfig {
    /// Prompt file, resolved by the prompt source
    pub prompt: String,
    /// Checkpoint labels this role may be consulted at
    pub checkpoints: Vec<String>,
    /// Consulted on demand, outside the checkpoint sequence
    pub out_of_band: bool,
    pub model: String,
    /// "low", "medium" or "high"
    pub reasoning_effort: String,
    /// "read-only" or "workspace-write"
    pub sandbox: String,
    pub max_latency_secs: u64,
    /// Extra verdict markers taught by the role prompt
    pub markers: RoleMarkers,
}

impl Default for FileRoleConfig {
    fn default() -> Self {
        let profile = ExecutionProfile::default();
        Self {
            prompt: String::new(),
            checkpoints: Vec::new(),
            out_of_band: false,
            model: profile.model,
            reasoning_effort: profile.reasoning_effort.as_str().to_string(),
            sandbox: profile.sandbox.as_str().to_string(),
            max_latency_secs: devgate_domain::DEFAULT_MAX_LATENCY.as_secs(),
            markers: RoleMarkers::default(),
        }
    }
}

impl From<&Role> for FileRoleConfig {
    fn from(role: &Role) -> Self {
        Self {
            prompt: role.prompt().to_string(),
            checkpoints: role
                .checkpoints()
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            out_of_band: role.is_out_of_band(),
            model: role.profile().model.clone(),
            reasoning_effort: role.profile().reasoning_effort.as_str().to_string(),
            sandbox: role.profile().sandbox.as_str().to_string(),
            max_latency_secs: role.max_latency().as_secs(),
            markers: role.markers().clone(),
        }
    }
}

/// The shipped roles, keyed by identifier
pub fn standard_roles() -> BTreeMap<String, FileRoleConfig> {
    Role::standard_set()
        .iter()
        .map(|role| (role.id().to_string(), FileRoleConfig::from(role)))
        .collect()
}

impl FileRoleConfig {
    /// Parse reasoning_effort, falling back to the default with a warning.
    pub fn parse_reasoning_effort(&self, id: &str) -> (ReasoningEffort, Vec<ConfigIssue>) {
        match self.reasoning_effort.parse::<ReasoningEffort>() {
            Ok(effort) => (effort, vec![]),
            Err(_) => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: format!("roles.{}.reasoning_effort", id),
                        value: self.reasoning_effort.clone(),
                        valid_values: ReasoningEffort::valid_values()
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    },
                    format!(
                        "roles.{}.reasoning_effort: unknown value '{}', falling back to '{}'",
                        id,
                        self.reasoning_effort,
                        ReasoningEffort::default().as_str()
                    ),
                );
                (ReasoningEffort::default(), vec![issue])
            }
        }
    }

    /// Parse sandbox, falling back to read-only with a warning.
    pub fn parse_sandbox(&self, id: &str) -> (SandboxMode, Vec<ConfigIssue>) {
        match self.sandbox.parse::<SandboxMode>() {
            Ok(mode) => (mode, vec![]),
            Err(_) => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: format!("roles.{}.sandbox", id),
                        value: self.sandbox.clone(),
                        valid_values: SandboxMode::valid_values()
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    },
                    format!(
                        "roles.{}.sandbox: unknown value '{}', falling back to '{}'",
                        id,
                        self.sandbox,
                        SandboxMode::default().as_str()
                    ),
                );
                (SandboxMode::default(), vec![issue])
            }
        }
    }

    /// Parse checkpoint labels. Unknown labels are errors and are dropped.
    pub fn parse_checkpoints(&self, id: &str) -> (Vec<CheckpointLabel>, Vec<ConfigIssue>) {
        let mut labels = Vec::new();
        let mut issues = Vec::new();
        for raw in &self.checkpoints {
            match raw.parse::<CheckpointLabel>() {
                Ok(label) => labels.push(label),
                Err(_) => issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownCheckpoint { label: raw.clone() },
                    format!(
                        "roles.{}.checkpoints: '{}' is not one of 0, T-1, T, T+1, L-1, L",
                        id, raw
                    ),
                )),
            }
        }
        (labels, issues)
    }

    /// Build the domain role. `None` when the entry has errors.
    pub fn to_role(&self, id: &str) -> (Option<Role>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let role_id = match RoleId::new(id) {
            Ok(role_id) => Some(role_id),
            Err(e) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "roles".to_string(),
                        value: id.to_string(),
                        valid_values: vec![],
                    },
                    format!("roles.{}: {}", id, e),
                ));
                None
            }
        };
        if self.prompt.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyField {
                    field: format!("roles.{}.prompt", id),
                },
                format!("roles.{}.prompt cannot be empty", id),
            ));
        }
        if self.model.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyField {
                    field: format!("roles.{}.model", id),
                },
                format!("roles.{}.model cannot be empty", id),
            ));
        }
        if self.max_latency_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: format!("roles.{}.max_latency_secs", id),
                },
                format!("roles.{}.max_latency_secs cannot be 0", id),
            ));
        }

        let (effort, effort_issues) = self.parse_reasoning_effort(id);
        let (sandbox, sandbox_issues) = self.parse_sandbox(id);
        let (checkpoints, checkpoint_issues) = self.parse_checkpoints(id);
        issues.extend(effort_issues);
        issues.extend(sandbox_issues);
        issues.extend(checkpoint_issues);

        if checkpoints.is_empty() && !self.out_of_band {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::UnreachableRole {
                    role: id.to_string(),
                },
                format!(
                    "roles.{}: no checkpoints and not out_of_band, so it is never consulted",
                    id
                ),
            ));
        }
        if !checkpoints.is_empty() && self.out_of_band {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::UnreachableRole {
                    role: id.to_string(),
                },
                format!(
                    "roles.{}: out_of_band roles never gate checkpoints; checkpoints are ignored",
                    id
                ),
            ));
        }

        if issues.iter().any(ConfigIssue::is_error) {
            return (None, issues);
        }
        let Some(role_id) = role_id else {
            return (None, issues);
        };

        let profile = ExecutionProfile::default()
            .with_model(self.model.trim())
            .with_reasoning_effort(effort)
            .with_sandbox(sandbox);
        let mut role = Role::new(role_id, PromptRef::new(self.prompt.trim()))
            .with_profile(profile)
            .with_max_latency(Duration::from_secs(self.max_latency_secs))
            .with_markers(self.markers.clone());
        if self.out_of_band {
            role = role.out_of_band();
        } else {
            role = role.with_checkpoints(checkpoints);
        }
        (Some(role), issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_roles_round_trip_to_domain() {
        for (id, config) in standard_roles() {
            let (role, issues) = config.to_role(&id);
            assert!(issues.is_empty(), "{:?}", issues);
            let role = role.unwrap();
            assert_eq!(role.id().as_str(), id);
            assert_eq!(role.profile(), &ExecutionProfile::default());
        }
    }

    #[test]
    fn test_role_deserialize() {
        let toml_str = r#"
[roles.security]
prompt = "security.md"
checkpoints = ["L-1"]
reasoning_effort = "medium"
max_latency_secs = 120

[roles.security.markers]
blocked = ["VULNERABLE"]
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let security = &config.roles["security"];
        let (role, issues) = security.to_role("security");
        assert!(issues.is_empty());
        let role = role.unwrap();
        assert_eq!(role.checkpoints(), &[CheckpointLabel::PreLanding]);
        assert_eq!(role.profile().reasoning_effort, ReasoningEffort::Medium);
        assert_eq!(role.profile().sandbox, SandboxMode::ReadOnly);
        assert_eq!(role.max_latency(), Duration::from_secs(120));
        assert_eq!(role.markers().blocked, vec!["VULNERABLE"]);
    }

    #[test]
    fn test_typo_sandbox_warns_and_falls_back() {
        let config = FileRoleConfig {
            prompt: "r.md".to_string(),
            checkpoints: vec!["T".to_string()],
            sandbox: "full-access".to_string(),
            ..Default::default()
        };
        let (role, issues) = config.to_role("reviewer");
        assert_eq!(role.unwrap().profile().sandbox, SandboxMode::ReadOnly);
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::InvalidEnumValue { field, .. } if field == "roles.reviewer.sandbox"
        )));
        assert!(issues.iter().all(|i| !i.is_error()));
    }

    #[test]
    fn test_errors_prevent_role() {
        let config = FileRoleConfig {
            prompt: String::new(),
            checkpoints: vec!["T+2".to_string()],
            max_latency_secs: 0,
            ..Default::default()
        };
        let (role, issues) = config.to_role("reviewer");
        assert!(role.is_none());
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::UnknownCheckpoint { label } if label == "T+2"
        )));
        assert_eq!(issues.iter().filter(|i| i.is_error()).count(), 3);
    }

    #[test]
    fn test_unreachable_role_warns() {
        let config = FileRoleConfig {
            prompt: "idle.md".to_string(),
            ..Default::default()
        };
        let (role, issues) = config.to_role("idle");
        assert!(role.is_some());
        assert!(matches!(
            issues[0].code,
            ConfigIssueCode::UnreachableRole { .. }
        ));
    }
}
