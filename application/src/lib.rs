//! Application layer for devgate
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod session_store;
pub mod use_cases;

// Re-export commonly used types
pub use config::GateParams;
pub use ports::{
    agent_transport::{AgentReply, AgentRequest, AgentTransport, TransportError},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    progress::{ConsultationProgress, NoProgress},
    prompt_source::{PromptSource, PromptSourceError},
    workflow_repository::{RepositoryError, WorkflowRepository, WorkflowSnapshot},
};
pub use session_store::{DEFAULT_IDLE_TTL, SessionStore};
pub use use_cases::checkpoint_scheduler::{
    CheckpointReport, CheckpointScheduler, EvaluateInput, Outcome, RoleResult, SchedulerError,
};
pub use use_cases::consult_role::{Consultation, ConsultRoleInput, ConsultRoleUseCase};
