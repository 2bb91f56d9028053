//! Agent transport port
//!
//! Defines how the application layer reaches an external review agent.
//! The adapter only moves text: prompt in, response text and conversation
//! identifier out. Timeouts, handle checks and outcome classification live in
//! [`ConsultRoleUseCase`](crate::use_cases::consult_role::ConsultRoleUseCase).

use async_trait::async_trait;
use devgate_domain::{ConversationToken, ExecutionProfile, RoleId};
use thiserror::Error;

/// Errors that can occur while talking to an agent process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Agent unreachable: {0}")]
    Unreachable(String),

    #[error("Agent process failed: {0}")]
    ProcessFailed(String),

    #[error("Agent reported an error: {0}")]
    AgentReported(String),

    #[error("Agent produced no response")]
    EmptyResponse,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// A single request to an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub role: RoleId,
    pub profile: ExecutionProfile,
    pub prompt: String,
    /// `None` requests a fresh conversation; `Some` continues one
    pub token: Option<ConversationToken>,
}

impl AgentRequest {
    pub fn is_continuation(&self) -> bool {
        self.token.is_some()
    }
}

/// What the agent sent back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    /// Conversation identifier reported by the agent, if any
    pub token: Option<ConversationToken>,
}

/// Transport to an external agent
///
/// Implementations block for as long as the agent needs; the caller bounds
/// the wait. Implementations never retry.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send(&self, request: AgentRequest) -> Result<AgentReply, TransportError>;
}
