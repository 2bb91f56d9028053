//! Workflow configuration from TOML (`[workflow]` section)

use devgate_domain::{
    AdvancementPolicy, CheckpointLabel, CheckpointPlan, ConfigIssue, ConfigIssueCode, RoleId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Raw workflow configuration from TOML
///
/// # Example
///
/// ```toml
/// [workflow]
/// checkpoints = ["0", "T", "T+1", "L"]
/// default_revision = "working-tree"
/// state_dir = ".devgate"
///
/// [workflow.required]
/// "T+1" = ["reviewer"]
///
/// [workflow.conditional]
/// "T+1" = 20   # skip below 20 changed lines
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWorkflowConfig {
    /// Checkpoint sequence for new workflows
    pub checkpoints: Vec<String>,
    /// Required roles per checkpoint label; unlisted labels use their default role
    pub required: BTreeMap<String, Vec<String>>,
    /// Conditional checkpoints: label to minimum changed lines
    pub conditional: BTreeMap<String, u32>,
    /// Revision recorded when `check` is run without `--revision`
    pub default_revision: String,
    /// Workflow state and logs live here
    pub state_dir: PathBuf,
}

impl Default for FileWorkflowConfig {
    fn default() -> Self {
        Self {
            checkpoints: CheckpointLabel::ALL
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            required: BTreeMap::new(),
            conditional: BTreeMap::new(),
            default_revision: "working-tree".to_string(),
            state_dir: PathBuf::from(".devgate"),
        }
    }
}

impl FileWorkflowConfig {
    fn parse_label(
        &self,
        field: &str,
        raw: &str,
        issues: &mut Vec<ConfigIssue>,
    ) -> Option<CheckpointLabel> {
        match raw.parse::<CheckpointLabel>() {
            Ok(label) => Some(label),
            Err(_) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownCheckpoint {
                        label: raw.to_string(),
                    },
                    format!(
                        "{}: '{}' is not one of 0, T-1, T, T+1, L-1, L",
                        field, raw
                    ),
                ));
                None
            }
        }
    }

    /// Parse the checkpoint sequence
    pub fn parse_checkpoints(&self) -> (Vec<CheckpointLabel>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let labels = self
            .checkpoints
            .iter()
            .filter_map(|raw| self.parse_label("workflow.checkpoints", raw, &mut issues))
            .collect();
        (labels, issues)
    }

    /// Parse per-label role overrides. Role ids not in `known_roles` are
    /// `UnknownRole` errors.
    pub fn parse_required(
        &self,
        known_roles: &[RoleId],
    ) -> (HashMap<CheckpointLabel, Vec<RoleId>>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut required = HashMap::new();
        for (raw_label, roles) in &self.required {
            let Some(label) = self.parse_label("workflow.required", raw_label, &mut issues) else {
                continue;
            };
            let mut ids = Vec::new();
            for raw_role in roles {
                match RoleId::new(raw_role.as_str()) {
                    Ok(id) if known_roles.contains(&id) => ids.push(id),
                    _ => issues.push(ConfigIssue::error(
                        ConfigIssueCode::UnknownRole {
                            role: raw_role.clone(),
                        },
                        format!(
                            "workflow.required.\"{}\": role '{}' is not registered",
                            raw_label, raw_role
                        ),
                    )),
                }
            }
            required.insert(label, ids);
        }
        (required, issues)
    }

    /// Parse conditional policies
    pub fn parse_conditional(
        &self,
    ) -> (HashMap<CheckpointLabel, AdvancementPolicy>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut policies = HashMap::new();
        for (raw_label, min_changed_lines) in &self.conditional {
            let Some(label) = self.parse_label("workflow.conditional", raw_label, &mut issues)
            else {
                continue;
            };
            if *min_changed_lines == 0 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::OutOfRange {
                        field: format!("workflow.conditional.\"{}\"", raw_label),
                    },
                    format!(
                        "workflow.conditional.\"{}\" = 0 never skips; the checkpoint stays mandatory",
                        raw_label
                    ),
                ));
            }
            policies.insert(
                label,
                AdvancementPolicy::Conditional {
                    min_changed_lines: *min_changed_lines,
                },
            );
        }
        (policies, issues)
    }

    /// Build the plan over `labels` (or the configured sequence)
    pub fn to_plan(
        &self,
        labels: Option<&[CheckpointLabel]>,
        known_roles: &[RoleId],
    ) -> (CheckpointPlan, Vec<ConfigIssue>) {
        let (configured, mut issues) = self.parse_checkpoints();
        let (required, required_issues) = self.parse_required(known_roles);
        let (policies, policy_issues) = self.parse_conditional();
        issues.extend(required_issues);
        issues.extend(policy_issues);
        let labels = labels.map(<[CheckpointLabel]>::to_vec).unwrap_or(configured);
        (
            CheckpointPlan::with_mapping(&labels, &required, &policies),
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<RoleId> {
        vec![RoleId::architect(), RoleId::reviewer()]
    }

    #[test]
    fn test_default_is_full_sequence() {
        let (plan, issues) = FileWorkflowConfig::default().to_plan(None, &known());
        assert!(issues.is_empty());
        assert_eq!(plan.labels(), CheckpointLabel::ALL.to_vec());
    }

    #[test]
    fn test_workflow_deserialize() {
        let toml_str = r#"
[workflow]
checkpoints = ["0", "T", "L"]

[workflow.required]
"L" = ["architect", "reviewer"]

[workflow.conditional]
"T" = 20
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let (plan, issues) = config.workflow.to_plan(None, &known());
        assert!(issues.is_empty());
        let checkpoints = plan.checkpoints();
        assert_eq!(checkpoints.len(), 3);
        assert_eq!(
            checkpoints[1].policy,
            AdvancementPolicy::Conditional { min_changed_lines: 20 }
        );
        assert_eq!(checkpoints[2].required_roles.len(), 2);
        assert!(checkpoints[2].terminal);
    }

    #[test]
    fn test_unknown_role_in_required_is_error() {
        let mut config = FileWorkflowConfig::default();
        config
            .required
            .insert("T".to_string(), vec!["auditor".to_string()]);
        let (_, issues) = config.to_plan(None, &known());
        assert!(issues.iter().any(|i| i.is_error()
            && matches!(&i.code, ConfigIssueCode::UnknownRole { role } if role == "auditor")));
    }

    #[test]
    fn test_unknown_label_is_error() {
        let config = FileWorkflowConfig {
            checkpoints: vec!["0".to_string(), "T+2".to_string()],
            ..Default::default()
        };
        let (labels, issues) = config.parse_checkpoints();
        assert_eq!(labels, vec![CheckpointLabel::Design]);
        assert!(issues[0].is_error());
    }

    #[test]
    fn test_explicit_labels_override_sequence() {
        let labels = [CheckpointLabel::Tests, CheckpointLabel::Landing];
        let (plan, _) = FileWorkflowConfig::default().to_plan(Some(&labels), &known());
        assert_eq!(plan.labels(), labels.to_vec());
    }
}
