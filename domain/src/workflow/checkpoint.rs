//! Checkpoint labels and definitions

use crate::core::error::DomainError;
use crate::role::value_objects::RoleId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position label of a checkpoint in the development workflow
///
/// The label set is fixed and totally ordered:
///
/// | Label | Meaning | Default role |
/// |-------|---------|--------------|
/// | `0`   | Design approval before implementation starts | architect |
/// | `T-1` | Test plan review before tests are written | architect |
/// | `T`   | Review of the written tests | reviewer |
/// | `T+1` | Review of the implementation once tests pass | reviewer |
/// | `L-1` | Final review before landing | reviewer |
/// | `L`   | Documentation update before landing | architect |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CheckpointLabel {
    Design,
    TestPlan,
    Tests,
    Implementation,
    PreLanding,
    Landing,
}

impl CheckpointLabel {
    pub const ALL: [CheckpointLabel; 6] = [
        CheckpointLabel::Design,
        CheckpointLabel::TestPlan,
        CheckpointLabel::Tests,
        CheckpointLabel::Implementation,
        CheckpointLabel::PreLanding,
        CheckpointLabel::Landing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointLabel::Design => "0",
            CheckpointLabel::TestPlan => "T-1",
            CheckpointLabel::Tests => "T",
            CheckpointLabel::Implementation => "T+1",
            CheckpointLabel::PreLanding => "L-1",
            CheckpointLabel::Landing => "L",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CheckpointLabel::Design => "Design approval before implementation starts",
            CheckpointLabel::TestPlan => "Test plan review before tests are written",
            CheckpointLabel::Tests => "Review of the written tests",
            CheckpointLabel::Implementation => "Review of the implementation once tests pass",
            CheckpointLabel::PreLanding => "Final review before landing",
            CheckpointLabel::Landing => "Documentation update before landing",
        }
    }

    /// Role consulted at this label when no explicit mapping is configured
    pub fn default_role(&self) -> RoleId {
        match self {
            CheckpointLabel::Design | CheckpointLabel::TestPlan | CheckpointLabel::Landing => {
                RoleId::architect()
            }
            CheckpointLabel::Tests
            | CheckpointLabel::Implementation
            | CheckpointLabel::PreLanding => RoleId::reviewer(),
        }
    }

    /// Parse a comma separated list such as `0,T,L`
    pub fn parse_list(s: &str) -> Result<Vec<CheckpointLabel>, DomainError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for CheckpointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointLabel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        match normalized.to_uppercase().as_str() {
            "0" => Ok(CheckpointLabel::Design),
            "T-1" => Ok(CheckpointLabel::TestPlan),
            "T" => Ok(CheckpointLabel::Tests),
            "T+1" => Ok(CheckpointLabel::Implementation),
            "L-1" => Ok(CheckpointLabel::PreLanding),
            "L" => Ok(CheckpointLabel::Landing),
            _ => Err(DomainError::UnknownCheckpoint(s.to_string())),
        }
    }
}

impl TryFrom<String> for CheckpointLabel {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CheckpointLabel> for String {
    fn from(label: CheckpointLabel) -> Self {
        label.as_str().to_string()
    }
}

/// Whether a checkpoint may be passed without consultation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvancementPolicy {
    /// Every required role must return a satisfying verdict
    #[default]
    Mandatory,
    /// Consultation is only required when the change is at least this large
    Conditional { min_changed_lines: u32 },
}

impl AdvancementPolicy {
    /// Whether a change of `changed_lines` lets the checkpoint pass unreviewed.
    ///
    /// An unknown change size never allows a skip.
    pub fn allows_skip(&self, changed_lines: Option<u32>) -> bool {
        match (self, changed_lines) {
            (AdvancementPolicy::Conditional { min_changed_lines }, Some(lines)) => {
                lines < *min_changed_lines
            }
            _ => false,
        }
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, AdvancementPolicy::Mandatory)
    }
}

impl fmt::Display for AdvancementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvancementPolicy::Mandatory => write!(f, "mandatory"),
            AdvancementPolicy::Conditional { min_changed_lines } => {
                write!(f, "conditional (>= {} changed lines)", min_changed_lines)
            }
        }
    }
}

/// A fixed point in the workflow where roles must be consulted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub label: CheckpointLabel,
    pub required_roles: Vec<RoleId>,
    pub policy: AdvancementPolicy,
    /// True only for the last checkpoint of a plan
    pub terminal: bool,
}

impl Checkpoint {
    pub fn new(label: CheckpointLabel, required_roles: Vec<RoleId>) -> Self {
        Self {
            label,
            required_roles,
            policy: AdvancementPolicy::Mandatory,
            terminal: false,
        }
    }

    pub fn with_policy(mut self, policy: AdvancementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn requires(&self, role: &RoleId) -> bool {
        self.required_roles.contains(role)
    }
}
