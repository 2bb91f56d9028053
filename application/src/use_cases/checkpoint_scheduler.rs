//! Checkpoint Scheduler
//!
//! Drives a [`WorkflowInstance`] through its checkpoints. For the current
//! checkpoint it consults every required role that has not yet approved the
//! current revision, concurrently, joins all of them, then lets the instance
//! advance only if every required role is satisfied.
//!
//! Every call returns one of `Advanced`, `Held`, `Completed` or `Aborted`;
//! requests that cannot be honoured at all (a checkpoint out of order, a
//! closed workflow) are errors and leave the instance untouched.

use crate::config::GateParams;
use crate::ports::agent_transport::AgentTransport;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::progress::{ConsultationProgress, NoProgress};
use crate::ports::prompt_source::PromptSource;
use crate::ports::workflow_repository::{RepositoryError, WorkflowRepository, WorkflowSnapshot};
use crate::session_store::SessionStore;
use crate::use_cases::consult_role::{Consultation, ConsultRoleInput, ConsultRoleUseCase};
use devgate_domain::{
    CheckpointLabel, CheckpointPlan, DomainError, InstanceId, RoleId, RoleRegistry,
    TransportOutcome, Verdict, WorkflowInstance, WorkflowState, current_timestamp,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors that reject a scheduler request outright
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Workflow storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("No workflow in progress")]
    NoWorkflow,
}

impl SchedulerError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            SchedulerError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Input for evaluating the current checkpoint
#[derive(Debug, Clone)]
pub struct EvaluateInput {
    pub label: CheckpointLabel,
    /// Code/artifact revision under review
    pub revision: Option<String>,
    /// Size of the change, for conditional checkpoints
    pub changed_lines: Option<u32>,
    /// Operator supplied context (diff summary, notes)
    pub context: String,
}

impl EvaluateInput {
    pub fn new(label: CheckpointLabel) -> Self {
        Self {
            label,
            revision: None,
            changed_lines: None,
            context: String::new(),
        }
    }

    pub fn at_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_changed_lines(mut self, lines: u32) -> Self {
        self.changed_lines = Some(lines);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// What happened with one required role during an evaluation
#[derive(Debug, Clone, Serialize)]
pub struct RoleResult {
    pub role: RoleId,
    pub outcome: TransportOutcome,
    /// `None` when the role was not consulted in this round
    pub verdict: Option<Verdict>,
    pub latency_ms: u64,
    /// Already approved this revision earlier; not consulted again
    pub carried_over: bool,
}

impl RoleResult {
    fn from_consultation(consultation: Consultation) -> Self {
        let Consultation {
            exchange, verdict, ..
        } = consultation;
        let consulted = exchange.outcome.is_ok();
        Self {
            role: exchange.role,
            latency_ms: exchange.latency.as_millis() as u64,
            outcome: exchange.outcome,
            verdict: consulted.then_some(verdict),
            carried_over: false,
        }
    }

    fn carried_over(role: RoleId) -> Self {
        Self {
            role,
            outcome: TransportOutcome::Ok,
            verdict: None,
            latency_ms: 0,
            carried_over: true,
        }
    }

    fn lost(role: RoleId, diagnostic: String) -> Self {
        Self {
            role,
            outcome: TransportOutcome::AgentError { diagnostic },
            verdict: None,
            latency_ms: 0,
            carried_over: false,
        }
    }

    /// Why this role holds the checkpoint, if it does
    pub fn hold_reason(&self) -> Option<String> {
        if self.carried_over {
            return None;
        }
        if !self.outcome.is_ok() {
            return Some(self.outcome.hold_reason());
        }
        match &self.verdict {
            Some(verdict) if verdict.is_satisfying() => None,
            Some(verdict) => Some(verdict.kind.as_str().to_string()),
            None => Some("inconclusive".to_string()),
        }
    }
}

/// Per-checkpoint detail attached to an outcome
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointReport {
    pub checkpoint: CheckpointLabel,
    pub revision: String,
    pub results: Vec<RoleResult>,
    /// Passed without consultation under a conditional policy
    pub skipped: bool,
}

impl CheckpointReport {
    /// (role, reason) for every role holding the checkpoint
    pub fn holds(&self) -> Vec<(RoleId, String)> {
        self.results
            .iter()
            .filter_map(|r| r.hold_reason().map(|reason| (r.role.clone(), reason)))
            .collect()
    }
}

/// Result of a scheduler operation, as reported to the driving caller
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Advanced {
        report: CheckpointReport,
        next: CheckpointLabel,
    },
    Held {
        report: CheckpointReport,
        reason: String,
    },
    Completed {
        report: CheckpointReport,
    },
    Aborted {
        checkpoint: Option<CheckpointLabel>,
        reason: String,
    },
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Advanced { .. } => "advanced",
            Outcome::Held { .. } => "held",
            Outcome::Completed { .. } => "completed",
            Outcome::Aborted { .. } => "aborted",
        }
    }

    pub fn report(&self) -> Option<&CheckpointReport> {
        match self {
            Outcome::Advanced { report, .. }
            | Outcome::Held { report, .. }
            | Outcome::Completed { report } => Some(report),
            Outcome::Aborted { .. } => None,
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self, Outcome::Held { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Advanced { report, next } => {
                write!(f, "Advanced: {} -> {}", report.checkpoint, next)
            }
            Outcome::Held { report, reason } => {
                write!(f, "Held at {}: {}", report.checkpoint, reason)
            }
            Outcome::Completed { .. } => write!(f, "Completed"),
            Outcome::Aborted { reason, .. } => write!(f, "Aborted: {}", reason),
        }
    }
}

/// The ordered workflow state machine driver
pub struct CheckpointScheduler<T: AgentTransport + 'static> {
    consult: Arc<ConsultRoleUseCase<T>>,
    transport: Arc<T>,
    prompts: Arc<dyn PromptSource>,
    registry: Arc<RoleRegistry>,
    sessions: Arc<SessionStore>,
    logger: Arc<dyn ConversationLogger>,
    params: GateParams,
}

impl<T: AgentTransport + 'static> CheckpointScheduler<T> {
    pub fn new(
        transport: Arc<T>,
        registry: Arc<RoleRegistry>,
        prompts: Arc<dyn PromptSource>,
        params: GateParams,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(
            params.token_format.clone(),
            params.idle_ttl,
        ));
        let consult = ConsultRoleUseCase::new(transport.clone(), sessions.clone(), prompts.clone());
        Self {
            consult: Arc::new(consult),
            transport,
            prompts,
            registry,
            sessions,
            logger: Arc::new(NoConversationLogger),
            params,
        }
    }

    /// Attach an audit logger to the scheduler and its consultations
    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.consult = Arc::new(
            ConsultRoleUseCase::new(
                self.transport.clone(),
                self.sessions.clone(),
                self.prompts.clone(),
            )
            .with_logger(logger.clone()),
        );
        self.logger = logger;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    /// Validate `plan` against the registry and create an instance at `Pending(0)`
    pub fn create_instance(&self, plan: CheckpointPlan) -> Result<WorkflowInstance, SchedulerError> {
        plan.validate(&self.registry)?;
        let id = InstanceId::new(format!(
            "wf-{}-{}",
            chrono::Utc::now().format("%Y%m%d"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        ));
        let instance = WorkflowInstance::new(id, plan, current_timestamp())?;
        info!(
            "Created workflow {} with checkpoints {}",
            instance.id(),
            instance
                .checkpoints()
                .iter()
                .map(|c| c.label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(instance)
    }

    /// Evaluate with default (no-op) progress
    pub async fn evaluate(
        &self,
        instance: &mut WorkflowInstance,
        input: EvaluateInput,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SchedulerError> {
        self.evaluate_with_progress(instance, input, &NoProgress, cancel)
            .await
    }

    /// Evaluate the checkpoint `input.label`, which must be the current one
    pub async fn evaluate_with_progress(
        &self,
        instance: &mut WorkflowInstance,
        input: EvaluateInput,
        progress: &dyn ConsultationProgress,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SchedulerError> {
        let index = instance.locate(input.label)?;
        let checkpoint = instance.checkpoints()[index].clone();
        let revision = input
            .revision
            .clone()
            .unwrap_or_else(|| self.params.default_revision.clone());

        if checkpoint.policy.allows_skip(input.changed_lines) {
            info!(
                "Checkpoint {} below its change threshold ({}); passing without consultation",
                checkpoint.label, checkpoint.policy
            );
            let state = instance.skip(index, input.changed_lines, current_timestamp())?;
            let report = CheckpointReport {
                checkpoint: checkpoint.label,
                revision,
                results: Vec::new(),
                skipped: true,
            };
            return Ok(self.report_outcome(instance, state_outcome(instance, state, report)));
        }

        let pending = instance.pending_roles(index, &revision);
        let mut results: Vec<RoleResult> = checkpoint
            .required_roles
            .iter()
            .filter(|role| !pending.contains(role))
            .cloned()
            .map(RoleResult::carried_over)
            .collect();

        instance.mark_in_progress();
        progress.on_checkpoint_start(checkpoint.label, &pending);

        let mut join_set = JoinSet::new();
        let mut outstanding: HashSet<RoleId> = HashSet::new();
        for role_id in &pending {
            let role = self.registry.get(role_id)?.clone();
            let consult_input = ConsultRoleInput {
                instance: instance.id().clone(),
                role,
                checkpoint: Some(checkpoint.label),
                revision: Some(revision.clone()),
                context: input.context.clone(),
            };
            progress.on_consultation_start(role_id, Some(checkpoint.label));
            outstanding.insert(role_id.clone());

            let consult = Arc::clone(&self.consult);
            let task_cancel = cancel.child_token();
            join_set.spawn(async move {
                consult
                    .execute_with_progress(consult_input, &NoProgress, &task_cancel)
                    .await
            });
        }

        let mut consultations = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // In-flight calls are left to finish on their own; their
                    // results are ignored.
                    join_set.detach_all();
                    return self.abort(instance, "operator cancelled during consultation");
                }
                next = join_set.join_next() => match next {
                    None => break,
                    Some(Ok(consultation)) => {
                        let verdict = consultation
                            .outcome()
                            .is_ok()
                            .then_some(consultation.verdict.kind);
                        progress.on_consultation_complete(
                            &consultation.exchange.role,
                            consultation.outcome(),
                            verdict,
                        );
                        outstanding.remove(&consultation.exchange.role);
                        consultations.push(consultation);
                    }
                    Some(Err(e)) => {
                        warn!("Consultation task failed: {}", e);
                    }
                },
            }
        }

        let now = current_timestamp();
        for consultation in consultations {
            if consultation.outcome().is_ok() {
                instance.record_verdict(
                    checkpoint.label,
                    &consultation.exchange.role,
                    &revision,
                    consultation.verdict.kind,
                    now,
                );
            }
            results.push(RoleResult::from_consultation(consultation));
        }
        for role in outstanding {
            let diagnostic = "consultation task ended without a result".to_string();
            progress.on_consultation_complete(
                &role,
                &TransportOutcome::AgentError {
                    diagnostic: diagnostic.clone(),
                },
                None,
            );
            results.push(RoleResult::lost(role, diagnostic));
        }
        results.sort_by(|a, b| {
            let position = |id: &RoleId| {
                checkpoint
                    .required_roles
                    .iter()
                    .position(|r| r == id)
                    .unwrap_or(usize::MAX)
            };
            position(&a.role).cmp(&position(&b.role))
        });
        progress.on_checkpoint_complete(checkpoint.label);

        let report = CheckpointReport {
            checkpoint: checkpoint.label,
            revision: revision.clone(),
            results,
            skipped: false,
        };

        let outcome = match instance.advance_if_satisfied(index, &revision, now)? {
            Some(state) => state_outcome(instance, state, report),
            None => {
                let mut reasons: Vec<String> = Vec::new();
                for (_, reason) in report.holds() {
                    if !reasons.contains(&reason) {
                        reasons.push(reason);
                    }
                }
                if reasons.is_empty() {
                    reasons.push("required roles not yet satisfied".to_string());
                }
                Outcome::Held {
                    reason: reasons.join("; "),
                    report,
                }
            }
        };
        Ok(self.report_outcome(instance, outcome))
    }

    /// Explicitly pass the current checkpoint without consultation.
    ///
    /// Only conditional checkpoints below their change threshold may be
    /// skipped; anything else fails with `SkipNotPermitted`.
    pub fn skip(
        &self,
        instance: &mut WorkflowInstance,
        label: CheckpointLabel,
        changed_lines: Option<u32>,
        revision: Option<String>,
    ) -> Result<Outcome, SchedulerError> {
        let index = instance.locate(label)?;
        let state = instance.skip(index, changed_lines, current_timestamp())?;
        let report = CheckpointReport {
            checkpoint: label,
            revision: revision.unwrap_or_else(|| self.params.default_revision.clone()),
            results: Vec::new(),
            skipped: true,
        };
        Ok(self.report_outcome(instance, state_outcome(instance, state, report)))
    }

    /// Operator cancellation: the instance moves to `Aborted` for good
    pub fn abort(
        &self,
        instance: &mut WorkflowInstance,
        reason: &str,
    ) -> Result<Outcome, SchedulerError> {
        let checkpoint = instance.current_checkpoint().map(|c| c.label);
        instance.abort(reason, current_timestamp())?;
        warn!("Workflow {} aborted: {}", instance.id(), reason);
        self.logger.log(ConversationEvent::new(
            "workflow_aborted",
            json!({
                "instance": instance.id().as_str(),
                "checkpoint": checkpoint.map(|c| c.as_str()),
                "reason": reason,
            }),
        ));
        Ok(Outcome::Aborted {
            checkpoint,
            reason: reason.to_string(),
        })
    }

    /// Consult an out-of-band role (e.g. the troubleshooter). Never changes
    /// the workflow position.
    pub async fn consult_out_of_band(
        &self,
        instance: &WorkflowInstance,
        role: &str,
        context: &str,
        progress: &dyn ConsultationProgress,
        cancel: &CancellationToken,
    ) -> Result<Consultation, SchedulerError> {
        instance.ensure_open()?;
        let role = self.registry.resolve(role)?;
        if !role.is_out_of_band() {
            return Err(DomainError::InvalidRole {
                role: role.id().to_string(),
                reason: "not an out-of-band role; it is consulted through its checkpoints"
                    .to_string(),
            }
            .into());
        }
        let input = ConsultRoleInput {
            instance: instance.id().clone(),
            role: role.clone(),
            checkpoint: None,
            revision: None,
            context: context.to_string(),
        };
        Ok(self
            .consult
            .execute_with_progress(input, progress, cancel)
            .await)
    }

    /// Invalidate the conversation with `role`; the next consultation starts afresh
    pub fn reset_session(
        &self,
        instance: &WorkflowInstance,
        role: &str,
        reason: &str,
    ) -> Result<bool, SchedulerError> {
        let role = self.registry.resolve(role)?;
        let reset = self.sessions.invalidate(instance.id(), role.id(), reason);
        if reset {
            self.logger.log(ConversationEvent::new(
                "handle_invalidated",
                json!({
                    "instance": instance.id().as_str(),
                    "role": role.id().as_str(),
                    "reason": reason,
                }),
            ));
        }
        Ok(reset)
    }

    // ==================== Persistence ====================

    pub fn snapshot(&self, instance: &WorkflowInstance) -> WorkflowSnapshot {
        WorkflowSnapshot {
            instance: instance.clone(),
            handles: self.sessions.handles_for(instance.id()),
            saved_at: current_timestamp(),
        }
    }

    /// Restore the session store from `snapshot` and hand back the instance
    pub fn resume(&self, snapshot: WorkflowSnapshot) -> WorkflowInstance {
        self.sessions.restore(snapshot.handles);
        snapshot.instance
    }

    pub async fn save(
        &self,
        repository: &dyn WorkflowRepository,
        instance: &WorkflowInstance,
    ) -> Result<(), SchedulerError> {
        repository.save(&self.snapshot(instance)).await?;
        Ok(())
    }

    pub async fn load(
        &self,
        repository: &dyn WorkflowRepository,
    ) -> Result<WorkflowInstance, SchedulerError> {
        let snapshot = repository.load().await?.ok_or(SchedulerError::NoWorkflow)?;
        Ok(self.resume(snapshot))
    }

    fn report_outcome(&self, instance: &WorkflowInstance, outcome: Outcome) -> Outcome {
        match &outcome {
            Outcome::Held { reason, report } => {
                warn!("Checkpoint {} held: {}", report.checkpoint, reason)
            }
            other => info!("{}", other),
        }
        self.logger.log(ConversationEvent::new(
            "checkpoint_outcome",
            json!({
                "instance": instance.id().as_str(),
                "state": instance.state(),
                "result": &outcome,
            }),
        ));
        outcome
    }
}

fn state_outcome(
    instance: &WorkflowInstance,
    state: WorkflowState,
    report: CheckpointReport,
) -> Outcome {
    match state {
        WorkflowState::Pending(next) => Outcome::Advanced {
            report,
            next: instance.checkpoints()[next].label,
        },
        WorkflowState::Completed => Outcome::Completed { report },
        WorkflowState::Aborted => Outcome::Aborted {
            checkpoint: Some(report.checkpoint),
            reason: instance.abort_reason().unwrap_or("aborted").to_string(),
        },
    }
}
