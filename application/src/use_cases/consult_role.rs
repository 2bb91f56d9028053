//! Consult Role use case
//!
//! One consultation with one role: pick the conversation handle, assemble
//! the prompt, send it with a bounded wait, reconcile the response and keep
//! the session store in step with what happened.
//!
//! Outcome handling:
//!
//! | Transport outcome | Handle |
//! |-------------------|--------|
//! | ok                | token installed on first contact, activity touched |
//! | timeout           | untouched, stays valid for a retry |
//! | malformed-handle  | invalidated; the next attempt starts a fresh conversation |
//! | agent-error       | untouched; the operator decides whether to reset it |
//! | cancelled         | untouched |

use crate::ports::agent_transport::{AgentRequest, AgentTransport};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger};
use crate::ports::progress::{ConsultationProgress, NoProgress};
use crate::ports::prompt_source::PromptSource;
use crate::session_store::SessionStore;
use devgate_domain::{
    AgentExchange, CheckpointLabel, ConsultationPrompt, ConversationHandle, DomainError, InstanceId,
    MarkerGrammar, Role, TransportOutcome, Verdict, current_timestamp, reconcile,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Input for one consultation
#[derive(Debug, Clone)]
pub struct ConsultRoleInput {
    pub instance: InstanceId,
    pub role: Role,
    /// `None` for out-of-band consultations
    pub checkpoint: Option<CheckpointLabel>,
    pub revision: Option<String>,
    pub context: String,
}

/// Result of one consultation
#[derive(Debug, Clone)]
pub struct Consultation {
    pub exchange: AgentExchange,
    pub verdict: Verdict,
    /// Whether this call started a new conversation
    pub fresh_session: bool,
}

impl Consultation {
    pub fn outcome(&self) -> &TransportOutcome {
        &self.exchange.outcome
    }
}

/// Use case for consulting a single role
pub struct ConsultRoleUseCase<T: AgentTransport + 'static> {
    transport: Arc<T>,
    sessions: Arc<SessionStore>,
    prompts: Arc<dyn PromptSource>,
    logger: Arc<dyn ConversationLogger>,
}

impl<T: AgentTransport + 'static> ConsultRoleUseCase<T> {
    pub fn new(transport: Arc<T>, sessions: Arc<SessionStore>, prompts: Arc<dyn PromptSource>) -> Self {
        Self {
            transport,
            sessions,
            prompts,
            logger: Arc::new(NoConversationLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Execute with default (no-op) progress and no cancellation
    pub async fn execute(&self, input: ConsultRoleInput) -> Consultation {
        self.execute_with_progress(input, &NoProgress, &CancellationToken::new())
            .await
    }

    pub async fn execute_with_progress(
        &self,
        input: ConsultRoleInput,
        progress: &dyn ConsultationProgress,
        cancel: &CancellationToken,
    ) -> Consultation {
        progress.on_consultation_start(input.role.id(), input.checkpoint);
        let consultation = self.consult(input, cancel).await;
        progress.on_consultation_complete(
            &consultation.exchange.role,
            &consultation.exchange.outcome,
            consultation
                .exchange
                .outcome
                .is_ok()
                .then_some(consultation.verdict.kind),
        );
        consultation
    }

    async fn consult(&self, input: ConsultRoleInput, cancel: &CancellationToken) -> Consultation {
        let role = &input.role;
        let handle = self.sessions.get_or_create(&input.instance, role.id());
        let fresh_session = handle.is_pending_creation();

        let mut prompt = ConsultationPrompt::new().with_context(input.context.clone());
        if let Some(label) = input.checkpoint {
            prompt = prompt.for_checkpoint(label);
        }
        if let Some(revision) = &input.revision {
            prompt = prompt.at_revision(revision.clone());
        }
        if fresh_session {
            match self.prompts.load(role.prompt()).await {
                Ok(text) => prompt = prompt.with_role_prompt(text),
                Err(e) => {
                    warn!("Prompt for role {} unavailable: {}", role.id(), e);
                    let exchange = AgentExchange::new(
                        role.id().clone(),
                        input.checkpoint,
                        prompt.render_fresh(),
                    )
                    .failed(
                        TransportOutcome::AgentError {
                            diagnostic: format!("role prompt unavailable: {}", e),
                        },
                        Duration::ZERO,
                    );
                    return self.finish(&input, &handle, exchange, fresh_session);
                }
            }
        }
        let text = prompt.render(fresh_session);

        let exchange = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Consultation with {} cancelled", role.id());
                AgentExchange::new(role.id().clone(), input.checkpoint, text.clone())
                    .failed(TransportOutcome::Cancelled, Duration::ZERO)
            }
            exchange = self.send(role, &handle, text.clone(), input.checkpoint) => exchange,
        };

        self.finish(&input, &handle, exchange, fresh_session)
    }

    /// Send `prompt` to `role` over `handle`.
    ///
    /// The handle is checked before anything is sent: a malformed token
    /// yields `MalformedHandle` without a transport call. The wait is bounded
    /// by the role's latency ceiling.
    pub async fn send(
        &self,
        role: &Role,
        handle: &ConversationHandle,
        prompt: String,
        checkpoint: Option<CheckpointLabel>,
    ) -> AgentExchange {
        let exchange = AgentExchange::new(role.id().clone(), checkpoint, prompt.clone());

        let token = match self.sessions.token_for_send(handle) {
            Ok(token) => token,
            Err(e) => {
                warn!("Refusing to send to {}: {}", role.id(), e);
                let reason = match e {
                    DomainError::MalformedHandle { reason, .. } => reason,
                    other => other.to_string(),
                };
                return exchange.failed(TransportOutcome::MalformedHandle { reason }, Duration::ZERO);
            }
        };

        let request = AgentRequest {
            role: role.id().clone(),
            profile: role.profile().clone(),
            prompt,
            token,
        };
        info!(
            "Consulting {} ({}, ceiling {}s)",
            role.id(),
            if request.is_continuation() { "continuation" } else { "fresh session" },
            role.max_latency().as_secs()
        );

        let started = Instant::now();
        match tokio::time::timeout(role.max_latency(), self.transport.send(request)).await {
            Err(_) => {
                warn!(
                    "{} did not respond within {}s",
                    role.id(),
                    role.max_latency().as_secs()
                );
                exchange.failed(
                    TransportOutcome::Timeout {
                        after_secs: role.max_latency().as_secs(),
                    },
                    started.elapsed(),
                )
            }
            Ok(Err(e)) => {
                warn!("{} failed: {}", role.id(), e);
                exchange.failed(
                    TransportOutcome::AgentError {
                        diagnostic: e.to_string(),
                    },
                    started.elapsed(),
                )
            }
            Ok(Ok(reply)) if reply.text.trim().is_empty() => exchange.failed(
                TransportOutcome::AgentError {
                    diagnostic: "agent returned an empty response".to_string(),
                },
                started.elapsed(),
            ),
            Ok(Ok(reply)) => {
                info!("{} responded after {:.1}s", role.id(), started.elapsed().as_secs_f64());
                exchange.succeeded(reply.text, reply.token, started.elapsed())
            }
        }
    }

    fn finish(
        &self,
        input: &ConsultRoleInput,
        handle: &ConversationHandle,
        exchange: AgentExchange,
        fresh_session: bool,
    ) -> Consultation {
        let role = &input.role;
        match &exchange.outcome {
            TransportOutcome::Ok => {
                if fresh_session {
                    match &exchange.reported_token {
                        Some(token) => {
                            self.sessions
                                .install_token(handle, token.clone(), current_timestamp());
                        }
                        None => warn!(
                            "{} did not report a conversation id; the next call starts a new conversation",
                            role.id()
                        ),
                    }
                } else if let Some(reported) = &exchange.reported_token
                    && Some(reported) != handle.token()
                {
                    warn!(
                        "{} reported conversation {} but {} was sent; keeping the original",
                        role.id(),
                        reported,
                        handle.token().map(|t| t.as_str()).unwrap_or("-")
                    );
                }
                if let Some(current) = self.sessions.get(&input.instance, role.id()) {
                    self.sessions.touch(&current);
                }
            }
            TransportOutcome::MalformedHandle { reason } => {
                self.sessions.invalidate(&input.instance, role.id(), reason);
                self.logger.log(ConversationEvent::new(
                    "handle_invalidated",
                    json!({
                        "instance": input.instance.as_str(),
                        "role": role.id().as_str(),
                        "token": handle.token().map(|t| t.as_str()),
                        "reason": reason,
                    }),
                ));
            }
            TransportOutcome::Timeout { .. }
            | TransportOutcome::AgentError { .. }
            | TransportOutcome::Cancelled => {}
        }

        let verdict = reconcile(&exchange, &MarkerGrammar::with_markers(role.markers()));
        debug!("{} verdict: {}", role.id(), verdict.kind);

        self.logger.log(ConversationEvent::new(
            "agent_exchange",
            json!({
                "instance": input.instance.as_str(),
                "role": role.id().as_str(),
                "checkpoint": input.checkpoint.map(|c| c.as_str()),
                "revision": input.revision,
                "fresh_session": fresh_session,
                "outcome": exchange.outcome.as_str(),
                "detail": exchange.outcome.to_string(),
                "latency_ms": exchange.latency.as_millis() as u64,
                "prompt_bytes": exchange.prompt.len(),
                "response": exchange.response,
                "token": exchange
                    .reported_token
                    .as_ref()
                    .or(handle.token())
                    .map(|t| t.as_str()),
                "verdict": verdict.kind.as_str(),
            }),
        ));

        Consultation {
            exchange,
            verdict,
            fresh_session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_transport::{AgentReply, TransportError};
    use crate::ports::prompt_source::PromptSourceError;
    use async_trait::async_trait;
    use devgate_domain::{
        ConversationToken, HandleState, PromptRef, RoleId, TokenFormat, VerdictKind,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ==================== Mock Implementations ====================

    enum Step {
        Reply(&'static str, Option<&'static str>),
        Fail(TransportError),
        Sleep(Duration),
    }

    struct MockTransport {
        steps: Mutex<VecDeque<Step>>,
        requests: Mutex<Vec<AgentRequest>>,
    }

    impl MockTransport {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AgentTransport for MockTransport {
        async fn send(&self, request: AgentRequest) -> Result<AgentReply, TransportError> {
            self.requests.lock().unwrap().push(request);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(text, token)) => Ok(AgentReply {
                    text: text.to_string(),
                    token: token.map(ConversationToken::new),
                }),
                Some(Step::Fail(e)) => Err(e),
                Some(Step::Sleep(d)) => {
                    tokio::time::sleep(d).await;
                    Ok(AgentReply {
                        text: "VERDICT: APPROVE".to_string(),
                        token: None,
                    })
                }
                None => Err(TransportError::Unreachable("no scripted reply".to_string())),
            }
        }
    }

    struct FixedPrompts;

    #[async_trait]
    impl PromptSource for FixedPrompts {
        async fn load(&self, reference: &PromptRef) -> Result<String, PromptSourceError> {
            if reference.as_str() == "missing.md" {
                return Err(PromptSourceError::NotFound(reference.to_string()));
            }
            Ok(format!("ROLE PROMPT {}", reference))
        }
    }

    fn use_case(transport: Arc<MockTransport>) -> ConsultRoleUseCase<MockTransport> {
        ConsultRoleUseCase::new(
            transport,
            Arc::new(SessionStore::new(TokenFormat::default(), Duration::from_secs(3600))),
            Arc::new(FixedPrompts),
        )
    }

    fn reviewer() -> Role {
        Role::new(RoleId::reviewer(), PromptRef::new("reviewer.md"))
            .with_checkpoints([CheckpointLabel::Tests])
    }

    fn input(role: Role) -> ConsultRoleInput {
        ConsultRoleInput {
            instance: InstanceId::new("wf-1"),
            role,
            checkpoint: Some(CheckpointLabel::Tests),
            revision: Some("r1".to_string()),
            context: "diff".to_string(),
        }
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_first_contact_installs_token_and_sends_role_prompt() {
        let transport = Arc::new(MockTransport::new(vec![
            Step::Reply("VERDICT: APPROVE", Some("conv_01ab")),
            Step::Reply("VERDICT: CONCERNS", Some("conv_01ab")),
        ]));
        let uc = use_case(transport.clone());

        let first = uc.execute(input(reviewer())).await;
        assert!(first.fresh_session);
        assert_eq!(first.verdict.kind, VerdictKind::Approve);

        let second = uc.execute(input(reviewer())).await;
        assert!(!second.fresh_session);
        assert_eq!(second.verdict.kind, VerdictKind::Concerns);

        let requests = transport.requests.lock().unwrap();
        assert!(requests[0].token.is_none());
        assert!(requests[0].prompt.contains("ROLE PROMPT reviewer.md"));
        assert_eq!(requests[1].token.as_ref().unwrap().as_str(), "conv_01ab");
        assert!(!requests[1].prompt.contains("ROLE PROMPT"));
    }

    #[tokio::test]
    async fn test_malformed_token_never_reaches_transport() {
        let transport = Arc::new(MockTransport::new(vec![
            // Agent reports an identifier without a scheme prefix
            Step::Reply("VERDICT: APPROVE", Some("0b6f2c1e-8a4d")),
            Step::Reply("VERDICT: APPROVE", Some("conv_22")),
        ]));
        let uc = use_case(transport.clone());

        uc.execute(input(reviewer())).await;
        assert_eq!(transport.calls(), 1);

        let second = uc.execute(input(reviewer())).await;
        assert!(matches!(
            second.outcome(),
            TransportOutcome::MalformedHandle { .. }
        ));
        assert_eq!(second.verdict.kind, VerdictKind::Inconclusive);
        assert_eq!(transport.calls(), 1, "no transport call for a malformed handle");

        let handle = uc
            .sessions()
            .get(&InstanceId::new("wf-1"), &RoleId::reviewer())
            .unwrap();
        assert_eq!(handle.state(), HandleState::Invalid);

        // Next attempt starts a fresh conversation
        let third = uc.execute(input(reviewer())).await;
        assert!(third.fresh_session);
        assert_eq!(transport.calls(), 2);
        assert!(transport.requests.lock().unwrap()[1].token.is_none());
    }

    #[tokio::test]
    async fn test_timeout_keeps_handle_valid() {
        let transport = Arc::new(MockTransport::new(vec![
            Step::Reply("VERDICT: APPROVE", Some("conv_01")),
            Step::Sleep(Duration::from_secs(30)),
        ]));
        let uc = use_case(transport.clone());
        let role = reviewer().with_max_latency(Duration::from_millis(50));

        uc.execute(input(role.clone())).await;
        let timed_out = uc.execute(input(role)).await;
        assert!(matches!(timed_out.outcome(), TransportOutcome::Timeout { .. }));
        assert_eq!(timed_out.verdict.kind, VerdictKind::Inconclusive);

        let handle = uc
            .sessions()
            .get(&InstanceId::new("wf-1"), &RoleId::reviewer())
            .unwrap();
        assert!(handle.is_active());
        assert_eq!(handle.token().unwrap().as_str(), "conv_01");
    }

    #[tokio::test]
    async fn test_agent_error_is_surfaced_without_retry() {
        let transport = Arc::new(MockTransport::new(vec![Step::Fail(
            TransportError::ProcessFailed("exit status 2: boom".to_string()),
        )]));
        let uc = use_case(transport.clone());

        let result = uc.execute(input(reviewer())).await;
        match result.outcome() {
            TransportOutcome::AgentError { diagnostic } => assert!(diagnostic.contains("boom")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_agent_error() {
        let transport = Arc::new(MockTransport::new(vec![Step::Reply("   ", Some("conv_1"))]));
        let uc = use_case(transport);
        let result = uc.execute(input(reviewer())).await;
        assert!(matches!(result.outcome(), TransportOutcome::AgentError { .. }));
    }

    #[tokio::test]
    async fn test_missing_role_prompt_is_agent_error() {
        let transport = Arc::new(MockTransport::new(vec![]));
        let uc = use_case(transport.clone());
        let role = Role::new(RoleId::reviewer(), PromptRef::new("missing.md"));
        let result = uc.execute(input(role)).await;
        assert!(matches!(result.outcome(), TransportOutcome::AgentError { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_returns_cancelled() {
        let transport = Arc::new(MockTransport::new(vec![Step::Sleep(Duration::from_secs(30))]));
        let uc = use_case(transport);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = uc
            .execute_with_progress(input(reviewer()), &NoProgress, &cancel)
            .await;
        assert_eq!(result.outcome(), &TransportOutcome::Cancelled);
    }
}
