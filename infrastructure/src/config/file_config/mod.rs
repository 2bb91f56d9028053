//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod logging;
mod output;
mod prompts;
mod roles;
mod session;
mod transport;
mod workflow;

pub use logging::FileLoggingConfig;
pub use output::FileOutputConfig;
pub use prompts::FilePromptsConfig;
pub use roles::{FileRoleConfig, standard_roles};
pub use session::FileSessionConfig;
pub use transport::FileTransportConfig;
pub use workflow::FileWorkflowConfig;

use crate::launcher::transport::LauncherConfig;
use devgate_application::GateParams;
use devgate_domain::{
    CheckpointLabel, CheckpointPlan, ConfigIssue, ConfigIssueCode, DomainError, RoleId,
    RoleRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("invalid configuration:\n{}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .filter(|i| i.is_error())
        .map(|i| format!("  - {}", i.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Agent launcher
    pub transport: FileTransportConfig,
    /// Conversation handles
    pub session: FileSessionConfig,
    /// Checkpoint sequence and routing
    pub workflow: FileWorkflowConfig,
    /// Role definitions keyed by role id
    pub roles: BTreeMap<String, FileRoleConfig>,
    /// Prompt lookup
    pub prompts: FilePromptsConfig,
    /// Diagnostic and audit logging
    pub logging: FileLoggingConfig,
    /// Output settings
    pub output: FileOutputConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            transport: FileTransportConfig::default(),
            session: FileSessionConfig::default(),
            workflow: FileWorkflowConfig::default(),
            roles: standard_roles(),
            prompts: FilePromptsConfig::default(),
            logging: FileLoggingConfig::default(),
            output: FileOutputConfig::default(),
        }
    }
}

/// Everything the binary needs, resolved from a valid [`FileConfig`]
#[derive(Debug, Clone)]
pub struct GateSetup {
    pub registry: RoleRegistry,
    pub plan: CheckpointPlan,
    pub params: GateParams,
    pub launcher: LauncherConfig,
    pub prompt_dirs: Vec<PathBuf>,
    pub state_dir: PathBuf,
    /// Non-fatal issues found while resolving
    pub warnings: Vec<ConfigIssue>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks every section, builds the role registry and validates the
    /// checkpoint plan against it. A workflow that names an unregistered role
    /// is reported as an `UnknownRole` error.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        self.build(None).1
    }

    /// Resolve into domain and adapter settings. Fails when any issue is an
    /// error; `labels` overrides the configured checkpoint sequence.
    pub fn resolve(
        &self,
        labels: Option<&[CheckpointLabel]>,
    ) -> Result<GateSetup, ConfigValidationError> {
        let (built, issues) = self.build(labels);
        let Some((registry, plan)) = built else {
            return Err(ConfigValidationError::Invalid(issues));
        };
        if issues.iter().any(ConfigIssue::is_error) {
            return Err(ConfigValidationError::Invalid(issues));
        }

        Ok(GateSetup {
            registry,
            plan,
            params: self.gate_params(),
            launcher: self.launcher_config(),
            prompt_dirs: self.prompts.dirs.clone(),
            state_dir: self.workflow.state_dir.clone(),
            warnings: issues,
        })
    }

    pub fn gate_params(&self) -> GateParams {
        GateParams::default()
            .with_token_format(self.session.token_format())
            .with_idle_ttl(self.session.idle_ttl())
            .with_default_revision(self.workflow.default_revision.clone())
    }

    pub fn launcher_config(&self) -> LauncherConfig {
        LauncherConfig {
            command: self.transport.command.trim().to_string(),
            args: self.transport.args.clone(),
            workdir: self.transport.workdir.clone(),
        }
    }

    fn build(
        &self,
        labels: Option<&[CheckpointLabel]>,
    ) -> (Option<(RoleRegistry, CheckpointPlan)>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        issues.extend(self.transport.validate());
        issues.extend(self.session.validate());

        let mut roles = Vec::new();
        for (id, config) in &self.roles {
            let (role, role_issues) = config.to_role(id);
            issues.extend(role_issues);
            roles.extend(role);
        }
        let known: Vec<RoleId> = roles.iter().map(|r| r.id().clone()).collect();

        let (plan, plan_issues) = self.workflow.to_plan(labels, &known);
        issues.extend(plan_issues);

        if issues.iter().any(ConfigIssue::is_error) {
            return (None, issues);
        }

        let registry = match RoleRegistry::new(roles) {
            Ok(registry) => registry,
            Err(e) => {
                issues.push(ConfigIssue::error(ConfigIssueCode::InvalidWorkflow, e.to_string()));
                return (None, issues);
            }
        };

        if let Err(e) = plan.validate(&registry) {
            let code = match &e {
                DomainError::UnknownRole(role) => ConfigIssueCode::UnknownRole { role: role.clone() },
                _ => ConfigIssueCode::InvalidWorkflow,
            };
            issues.push(ConfigIssue::error(code, format!("workflow: {}", e)));
            return (None, issues);
        }

        (Some((registry, plan)), issues)
    }
}
