//! Role entity

use super::value_objects::{ExecutionProfile, PromptRef, RoleId};
use crate::workflow::checkpoint::CheckpointLabel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default ceiling for a single consultation
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_secs(600);

/// Extra verdict markers a role's prompt teaches the agent to emit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMarkers {
    #[serde(default)]
    pub approve: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub bugs_found: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
}

impl RoleMarkers {
    pub fn is_empty(&self) -> bool {
        self.approve.is_empty()
            && self.concerns.is_empty()
            && self.bugs_found.is_empty()
            && self.blocked.is_empty()
    }
}

/// A named specialist consultation profile (Entity)
///
/// Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    id: RoleId,
    prompt: PromptRef,
    checkpoints: Vec<CheckpointLabel>,
    out_of_band: bool,
    max_latency: Duration,
    profile: ExecutionProfile,
    markers: RoleMarkers,
}

impl Role {
    pub fn new(id: RoleId, prompt: PromptRef) -> Self {
        Self {
            id,
            prompt,
            checkpoints: Vec::new(),
            out_of_band: false,
            max_latency: DEFAULT_MAX_LATENCY,
            profile: ExecutionProfile::default(),
            markers: RoleMarkers::default(),
        }
    }

    pub fn with_checkpoints(mut self, checkpoints: impl IntoIterator<Item = CheckpointLabel>) -> Self {
        self.checkpoints = checkpoints.into_iter().collect();
        self.checkpoints.sort();
        self.checkpoints.dedup();
        self
    }

    /// Out-of-band roles may be consulted at any point without affecting the
    /// workflow position.
    pub fn out_of_band(mut self) -> Self {
        self.out_of_band = true;
        self
    }

    pub fn with_max_latency(mut self, max_latency: Duration) -> Self {
        self.max_latency = max_latency;
        self
    }

    pub fn with_profile(mut self, profile: ExecutionProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_markers(mut self, markers: RoleMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn id(&self) -> &RoleId {
        &self.id
    }

    pub fn prompt(&self) -> &PromptRef {
        &self.prompt
    }

    pub fn checkpoints(&self) -> &[CheckpointLabel] {
        &self.checkpoints
    }

    pub fn is_out_of_band(&self) -> bool {
        self.out_of_band
    }

    pub fn max_latency(&self) -> Duration {
        self.max_latency
    }

    pub fn profile(&self) -> &ExecutionProfile {
        &self.profile
    }

    pub fn markers(&self) -> &RoleMarkers {
        &self.markers
    }

    pub fn may_consult_at(&self, label: CheckpointLabel) -> bool {
        self.checkpoints.contains(&label)
    }

    /// The three roles the workflow ships with
    pub fn standard_set() -> Vec<Role> {
        vec![
            Role::new(RoleId::architect(), PromptRef::new("architect.md")).with_checkpoints([
                CheckpointLabel::Design,
                CheckpointLabel::TestPlan,
                CheckpointLabel::Landing,
            ]),
            Role::new(RoleId::reviewer(), PromptRef::new("reviewer.md")).with_checkpoints([
                CheckpointLabel::Tests,
                CheckpointLabel::Implementation,
                CheckpointLabel::PreLanding,
            ]),
            Role::new(RoleId::troubleshooter(), PromptRef::new("troubleshooter.md"))
                .out_of_band()
                .with_markers(RoleMarkers {
                    approve: vec!["ROOT CAUSE IDENTIFIED".to_string()],
                    ..Default::default()
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_are_sorted_and_deduplicated() {
        let role = Role::new(RoleId::reviewer(), PromptRef::new("r.md")).with_checkpoints([
            CheckpointLabel::PreLanding,
            CheckpointLabel::Tests,
            CheckpointLabel::Tests,
        ]);
        assert_eq!(
            role.checkpoints(),
            &[CheckpointLabel::Tests, CheckpointLabel::PreLanding]
        );
        assert!(role.may_consult_at(CheckpointLabel::Tests));
        assert!(!role.may_consult_at(CheckpointLabel::Design));
    }

    #[test]
    fn test_standard_set() {
        let roles = Role::standard_set();
        assert_eq!(roles.len(), 3);
        let troubleshooter = roles
            .iter()
            .find(|r| r.id() == &RoleId::troubleshooter())
            .unwrap();
        assert!(troubleshooter.is_out_of_band());
        assert!(troubleshooter.checkpoints().is_empty());
        assert!(roles.iter().all(|r| r.max_latency() == DEFAULT_MAX_LATENCY));
    }
}
