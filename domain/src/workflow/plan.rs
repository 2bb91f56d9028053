//! Checkpoint → role mapping table
//!
//! A [`CheckpointPlan`] is the ordered list of checkpoints a new workflow
//! instance is created with. It is validated against the [`RoleRegistry`]
//! once, before any instance exists, so routing never resolves roles by
//! string matching at call time.

use super::checkpoint::{AdvancementPolicy, Checkpoint, CheckpointLabel};
use crate::core::error::DomainError;
use crate::role::registry::RoleRegistry;
use crate::role::value_objects::RoleId;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPlan {
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointPlan {
    /// Plan over `labels` using each label's default role
    pub fn from_labels(labels: &[CheckpointLabel]) -> Self {
        Self::with_mapping(labels, &HashMap::new(), &HashMap::new())
    }

    /// Plan over `labels` with per-label role and policy overrides
    pub fn with_mapping(
        labels: &[CheckpointLabel],
        roles: &HashMap<CheckpointLabel, Vec<RoleId>>,
        policies: &HashMap<CheckpointLabel, AdvancementPolicy>,
    ) -> Self {
        let mut checkpoints: Vec<Checkpoint> = labels
            .iter()
            .map(|label| {
                let required = roles
                    .get(label)
                    .cloned()
                    .unwrap_or_else(|| vec![label.default_role()]);
                let policy = policies.get(label).copied().unwrap_or_default();
                Checkpoint::new(*label, required).with_policy(policy)
            })
            .collect();
        if let Some(last) = checkpoints.last_mut() {
            last.terminal = true;
        }
        Self { checkpoints }
    }

    /// The full `0, T-1, T, T+1, L-1, L` sequence
    pub fn standard() -> Self {
        Self::from_labels(&CheckpointLabel::ALL)
    }

    /// Check the plan against the registry.
    ///
    /// Rejects empty plans, duplicate or out-of-order labels, checkpoints with
    /// no required role, roles that are not registered, out-of-band roles in
    /// the main sequence, and roles not allowed at a checkpoint.
    pub fn validate(&self, registry: &RoleRegistry) -> Result<(), DomainError> {
        if self.checkpoints.is_empty() {
            return Err(DomainError::InvalidWorkflow(
                "a workflow needs at least one checkpoint".to_string(),
            ));
        }

        for pair in self.checkpoints.windows(2) {
            if pair[0].label >= pair[1].label {
                return Err(DomainError::InvalidWorkflow(format!(
                    "checkpoint {} cannot follow {}",
                    pair[1].label, pair[0].label
                )));
            }
        }

        for checkpoint in &self.checkpoints {
            if checkpoint.required_roles.is_empty() {
                return Err(DomainError::InvalidWorkflow(format!(
                    "checkpoint {} has no required role",
                    checkpoint.label
                )));
            }
            for role_id in &checkpoint.required_roles {
                let role = registry.get(role_id)?;
                if role.is_out_of_band() {
                    return Err(DomainError::InvalidWorkflow(format!(
                        "role '{}' is out-of-band and cannot gate checkpoint {}",
                        role_id, checkpoint.label
                    )));
                }
                if !role.may_consult_at(checkpoint.label) {
                    return Err(DomainError::InvalidWorkflow(format!(
                        "role '{}' is not allowed at checkpoint {}",
                        role_id, checkpoint.label
                    )));
                }
            }
        }

        let terminal_count = self.checkpoints.iter().filter(|c| c.terminal).count();
        let last_is_terminal = self.checkpoints.last().is_some_and(|c| c.terminal);
        if terminal_count != 1 || !last_is_terminal {
            return Err(DomainError::InvalidWorkflow(
                "only the last checkpoint may be terminal".to_string(),
            ));
        }

        Ok(())
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn labels(&self) -> Vec<CheckpointLabel> {
        self.checkpoints.iter().map(|c| c.label).collect()
    }

    pub fn into_checkpoints(self) -> Vec<Checkpoint> {
        self.checkpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::entities::Role;
    use crate::role::value_objects::PromptRef;

    #[test]
    fn test_standard_plan_is_valid() {
        let plan = CheckpointPlan::standard();
        assert!(plan.validate(&RoleRegistry::standard()).is_ok());
        assert_eq!(plan.checkpoints().len(), 6);
        assert!(plan.checkpoints().last().unwrap().terminal);
        assert_eq!(plan.checkpoints().iter().filter(|c| c.terminal).count(), 1);
    }

    #[test]
    fn test_short_plan_uses_default_roles() {
        let plan = CheckpointPlan::from_labels(&[
            CheckpointLabel::Design,
            CheckpointLabel::Tests,
            CheckpointLabel::Landing,
        ]);
        assert!(plan.validate(&RoleRegistry::standard()).is_ok());
        let roles: Vec<&RoleId> = plan
            .checkpoints()
            .iter()
            .map(|c| &c.required_roles[0])
            .collect();
        assert_eq!(
            roles,
            vec![&RoleId::architect(), &RoleId::reviewer(), &RoleId::architect()]
        );
    }

    #[test]
    fn test_empty_plan_is_invalid() {
        let plan = CheckpointPlan::from_labels(&[]);
        assert!(matches!(
            plan.validate(&RoleRegistry::standard()),
            Err(DomainError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_reordered_plan_is_invalid() {
        let plan = CheckpointPlan::from_labels(&[CheckpointLabel::Tests, CheckpointLabel::Design]);
        assert!(plan.validate(&RoleRegistry::standard()).is_err());

        let dup = CheckpointPlan::from_labels(&[CheckpointLabel::Tests, CheckpointLabel::Tests]);
        assert!(dup.validate(&RoleRegistry::standard()).is_err());
    }

    #[test]
    fn test_unregistered_role_is_unknown_role() {
        let mut roles = HashMap::new();
        roles.insert(CheckpointLabel::Tests, vec![RoleId::new("auditor").unwrap()]);
        let plan = CheckpointPlan::with_mapping(&[CheckpointLabel::Tests], &roles, &HashMap::new());
        assert_eq!(
            plan.validate(&RoleRegistry::standard()).unwrap_err(),
            DomainError::UnknownRole("auditor".to_string())
        );
    }

    #[test]
    fn test_role_not_allowed_at_checkpoint() {
        let mut roles = HashMap::new();
        roles.insert(CheckpointLabel::Design, vec![RoleId::reviewer()]);
        let plan =
            CheckpointPlan::with_mapping(&[CheckpointLabel::Design], &roles, &HashMap::new());
        assert!(matches!(
            plan.validate(&RoleRegistry::standard()),
            Err(DomainError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_out_of_band_role_cannot_gate() {
        let registry = RoleRegistry::new(vec![
            Role::new(RoleId::troubleshooter(), PromptRef::new("t.md"))
                .out_of_band()
                .with_checkpoints([CheckpointLabel::Tests]),
        ])
        .unwrap();
        let mut roles = HashMap::new();
        roles.insert(CheckpointLabel::Tests, vec![RoleId::troubleshooter()]);
        let plan = CheckpointPlan::with_mapping(&[CheckpointLabel::Tests], &roles, &HashMap::new());
        assert!(plan.validate(&registry).is_err());
    }

    #[test]
    fn test_policy_override() {
        let mut policies = HashMap::new();
        policies.insert(
            CheckpointLabel::TestPlan,
            AdvancementPolicy::Conditional { min_changed_lines: 50 },
        );
        let plan = CheckpointPlan::with_mapping(&CheckpointLabel::ALL, &HashMap::new(), &policies);
        assert_eq!(
            plan.checkpoints()[1].policy,
            AdvancementPolicy::Conditional { min_changed_lines: 50 }
        );
        assert!(plan.checkpoints()[0].policy.is_mandatory());
    }
}
