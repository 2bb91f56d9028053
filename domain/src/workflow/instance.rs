//! Workflow instance state machine
//!
//! ```text
//! Pending(0) ──all required roles satisfied──▶ Pending(1) ─ ... ─▶ Pending(last) ──▶ Completed
//!     │  ▲                                                                  │
//!     └──┘ held (bugs-found / blocked / inconclusive / transport failure)   │
//!     │                                                                     │
//!     └────────────────────────── operator abort ──────────────────────────┴──▶ Aborted
//! ```
//!
//! The position only moves forward, one checkpoint at a time, and only from
//! inside this module.

use super::checkpoint::{Checkpoint, CheckpointLabel};
use super::plan::CheckpointPlan;
use crate::core::error::DomainError;
use crate::core::time::Millis;
use crate::role::value_objects::RoleId;
use crate::verdict::entities::VerdictKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a workflow instance (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum WorkflowState {
    Pending(usize),
    Completed,
    Aborted,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Aborted)
    }
}

/// Coarse status reported to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Completed,
    Aborted,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::InProgress => "in-progress",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict recorded for (checkpoint, role, revision)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub checkpoint: CheckpointLabel,
    pub role: RoleId,
    pub revision: String,
    pub kind: VerdictKind,
    pub recorded_at: Millis,
}

/// One entry of the transition history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at: Millis,
    pub note: String,
}

/// A development workflow tracked as an ordered sequence of checkpoints
///
/// Owned by the caller and handed to the scheduler by mutable reference.
/// Deserialization rejects states this module could never have produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredInstance")]
pub struct WorkflowInstance {
    id: InstanceId,
    checkpoints: Vec<Checkpoint>,
    state: WorkflowState,
    started: bool,
    #[serde(default)]
    verdicts: Vec<VerdictRecord>,
    #[serde(default)]
    transitions: Vec<TransitionRecord>,
    #[serde(default)]
    abort_reason: Option<String>,
    created_at: Millis,
}

/// Serialized form of [`WorkflowInstance`], checked before use
#[derive(Deserialize)]
struct StoredInstance {
    id: InstanceId,
    checkpoints: Vec<Checkpoint>,
    state: WorkflowState,
    started: bool,
    #[serde(default)]
    verdicts: Vec<VerdictRecord>,
    #[serde(default)]
    transitions: Vec<TransitionRecord>,
    #[serde(default)]
    abort_reason: Option<String>,
    created_at: Millis,
}

impl TryFrom<StoredInstance> for WorkflowInstance {
    type Error = DomainError;

    fn try_from(stored: StoredInstance) -> Result<Self, Self::Error> {
        let instance = Self {
            id: stored.id,
            checkpoints: stored.checkpoints,
            state: stored.state,
            started: stored.started,
            verdicts: stored.verdicts,
            transitions: stored.transitions,
            abort_reason: stored.abort_reason,
            created_at: stored.created_at,
        };
        instance.validate()?;
        Ok(instance)
    }
}

impl WorkflowInstance {
    /// Create an instance at `Pending(0)`. The plan must already be
    /// validated against the role registry.
    pub fn new(id: InstanceId, plan: CheckpointPlan, now: Millis) -> Result<Self, DomainError> {
        let checkpoints = plan.into_checkpoints();
        if checkpoints.is_empty() {
            return Err(DomainError::InvalidWorkflow(
                "a workflow needs at least one checkpoint".to_string(),
            ));
        }
        Ok(Self {
            id,
            checkpoints,
            state: WorkflowState::Pending(0),
            started: false,
            verdicts: Vec::new(),
            transitions: Vec::new(),
            abort_reason: None,
            created_at: now,
        })
    }

    /// Structural consistency: at least one checkpoint, labels in strictly
    /// increasing order, and a pending position inside the plan.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.checkpoints.is_empty() {
            return Err(DomainError::InvalidWorkflow(format!(
                "workflow {} has no checkpoints",
                self.id
            )));
        }
        if let Some(pair) = self
            .checkpoints
            .windows(2)
            .find(|pair| pair[0].label >= pair[1].label)
        {
            return Err(DomainError::InvalidWorkflow(format!(
                "workflow {}: checkpoint {} cannot follow {}",
                self.id, pair[1].label, pair[0].label
            )));
        }
        if let WorkflowState::Pending(index) = self.state
            && index >= self.checkpoints.len()
        {
            return Err(DomainError::InvalidWorkflow(format!(
                "workflow {} is pending at checkpoint #{} but has only {}",
                self.id,
                index,
                self.checkpoints.len()
            )));
        }
        Ok(())
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn status(&self) -> WorkflowStatus {
        match self.state {
            WorkflowState::Pending(_) if self.started => WorkflowStatus::InProgress,
            WorkflowState::Pending(_) => WorkflowStatus::Pending,
            WorkflowState::Completed => WorkflowStatus::Completed,
            WorkflowState::Aborted => WorkflowStatus::Aborted,
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self.state {
            WorkflowState::Pending(index) => Some(index),
            _ => None,
        }
    }

    pub fn current_checkpoint(&self) -> Option<&Checkpoint> {
        self.position().and_then(|index| self.checkpoints.get(index))
    }

    pub fn verdicts(&self) -> &[VerdictRecord] {
        &self.verdicts
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    pub fn created_at(&self) -> Millis {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    /// Resolve `label` to the current checkpoint index.
    ///
    /// Fails with `OutOfOrderCheckpoint` for any label other than the current
    /// one. Never mutates the instance.
    pub fn locate(&self, label: CheckpointLabel) -> Result<usize, DomainError> {
        self.ensure_open()?;
        let index = self
            .checkpoints
            .iter()
            .position(|c| c.label == label)
            .ok_or_else(|| {
                DomainError::UnknownCheckpoint(format!(
                    "{} (not part of workflow {})",
                    label, self.id
                ))
            })?;
        match self.state {
            WorkflowState::Pending(current) if current == index => Ok(index),
            WorkflowState::Pending(current) => Err(DomainError::OutOfOrderCheckpoint {
                requested: label.to_string(),
                current: self.label_at(current),
            }),
            _ => Err(self.closed_error()),
        }
    }

    pub fn mark_in_progress(&mut self) {
        if !self.is_closed() {
            self.started = true;
        }
    }

    /// Record (or replace) the verdict of `role` at `checkpoint` for `revision`
    pub fn record_verdict(
        &mut self,
        checkpoint: CheckpointLabel,
        role: &RoleId,
        revision: &str,
        kind: VerdictKind,
        now: Millis,
    ) {
        self.started = true;
        self.verdicts.retain(|r| {
            !(r.checkpoint == checkpoint && &r.role == role && r.revision == revision)
        });
        self.verdicts.push(VerdictRecord {
            checkpoint,
            role: role.clone(),
            revision: revision.to_string(),
            kind,
            recorded_at: now,
        });
    }

    /// Whether `role` holds a satisfying verdict at `checkpoint` for `revision`
    pub fn is_satisfied(&self, checkpoint: CheckpointLabel, role: &RoleId, revision: &str) -> bool {
        self.verdicts.iter().any(|r| {
            r.checkpoint == checkpoint
                && &r.role == role
                && r.revision == revision
                && r.kind.is_satisfying()
        })
    }

    /// Required roles at checkpoint `index` still lacking a satisfying
    /// verdict for `revision`
    pub fn pending_roles(&self, index: usize, revision: &str) -> Vec<RoleId> {
        self.checkpoints
            .get(index)
            .map(|checkpoint| {
                checkpoint
                    .required_roles
                    .iter()
                    .filter(|role| !self.is_satisfied(checkpoint.label, role, revision))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Advance past checkpoint `index` if every required role is satisfied
    /// for `revision`. Returns the new state, or `None` when held.
    pub fn advance_if_satisfied(
        &mut self,
        index: usize,
        revision: &str,
        now: Millis,
    ) -> Result<Option<WorkflowState>, DomainError> {
        self.ensure_current(index)?;
        if !self.pending_roles(index, revision).is_empty() {
            return Ok(None);
        }
        let note = format!("revision {} approved", revision);
        Ok(Some(self.step_forward(index, now, note)))
    }

    /// Pass checkpoint `index` without consultation. Only allowed when its
    /// policy is conditional and the change is below the threshold.
    pub fn skip(
        &mut self,
        index: usize,
        changed_lines: Option<u32>,
        now: Millis,
    ) -> Result<WorkflowState, DomainError> {
        self.ensure_current(index)?;
        let checkpoint = self.checkpoints.get(index).ok_or_else(|| {
            DomainError::InvalidWorkflow(format!("workflow {} has no checkpoint #{}", self.id, index))
        })?;
        if !checkpoint.policy.allows_skip(changed_lines) {
            let reason = match (checkpoint.policy.is_mandatory(), changed_lines) {
                (true, _) => "checkpoint is mandatory".to_string(),
                (false, None) => "change size is unknown".to_string(),
                (false, Some(lines)) => format!(
                    "{} changed lines reaches the {} threshold",
                    lines, checkpoint.policy
                ),
            };
            return Err(DomainError::SkipNotPermitted {
                label: checkpoint.label.to_string(),
                reason,
            });
        }
        let note = match changed_lines {
            Some(lines) => format!("skipped ({} changed lines)", lines),
            None => "skipped".to_string(),
        };
        self.started = true;
        Ok(self.step_forward(index, now, note))
    }

    /// Operator cancellation. Aborting twice is a no-op; a completed
    /// workflow cannot be aborted.
    pub fn abort(&mut self, reason: impl Into<String>, now: Millis) -> Result<(), DomainError> {
        match self.state {
            WorkflowState::Aborted => Ok(()),
            WorkflowState::Completed => Err(self.closed_error()),
            from @ WorkflowState::Pending(_) => {
                let reason = reason.into();
                self.transitions.push(TransitionRecord {
                    from,
                    to: WorkflowState::Aborted,
                    at: now,
                    note: reason.clone(),
                });
                self.abort_reason = Some(reason);
                self.state = WorkflowState::Aborted;
                Ok(())
            }
        }
    }

    fn ensure_current(&self, index: usize) -> Result<(), DomainError> {
        self.ensure_open()?;
        match self.state {
            WorkflowState::Pending(current) if current == index => Ok(()),
            WorkflowState::Pending(current) => Err(DomainError::OutOfOrderCheckpoint {
                requested: self
                    .checkpoints
                    .get(index)
                    .map(|c| c.label.to_string())
                    .unwrap_or_else(|| format!("#{}", index)),
                current: self.label_at(current),
            }),
            _ => Err(self.closed_error()),
        }
    }

    fn label_at(&self, index: usize) -> String {
        self.checkpoints
            .get(index)
            .map(|c| c.label.to_string())
            .unwrap_or_else(|| format!("#{}", index))
    }

    fn closed_error(&self) -> DomainError {
        DomainError::WorkflowClosed {
            instance: self.id.to_string(),
            status: self.status().to_string(),
        }
    }

    fn step_forward(&mut self, index: usize, now: Millis, note: String) -> WorkflowState {
        let from = self.state;
        let terminal = self.checkpoints.get(index).is_none_or(|c| c.terminal);
        let to = if terminal || index + 1 >= self.checkpoints.len() {
            WorkflowState::Completed
        } else {
            WorkflowState::Pending(index + 1)
        };
        self.transitions.push(TransitionRecord { from, to, at: now, note });
        self.state = to;
        to
    }
}
