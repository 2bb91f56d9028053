//! Domain layer for devgate
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Checkpoints
//!
//! A development workflow is a fixed, ordered sequence of checkpoints
//! (`0, T-1, T, T+1, L-1, L`). Each checkpoint names the roles that must be
//! consulted before the workflow may move past it.
//!
//! ## Roles and conversations
//!
//! - **Role**: a specialist consultation profile (architect, reviewer, troubleshooter)
//! - **Conversation handle**: one per (workflow instance, role), so follow-ups
//!   continue the same reasoning context
//!
//! ## Verdicts
//!
//! Agent responses are reconciled into approve / concerns / bugs-found /
//! blocked / inconclusive. Only approve and concerns advance a checkpoint.

pub mod config;
pub mod core;
pub mod exchange;
pub mod prompt;
pub mod role;
pub mod session;
pub mod verdict;
pub mod workflow;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use core::{
    error::DomainError,
    time::{Millis, current_timestamp},
};
pub use exchange::{AgentExchange, TransportOutcome};
pub use prompt::ConsultationPrompt;
pub use role::{
    entities::{DEFAULT_MAX_LATENCY, Role, RoleMarkers},
    registry::RoleRegistry,
    value_objects::{ExecutionProfile, PromptRef, ReasoningEffort, RoleId, SandboxMode},
};
pub use session::{
    handle::{ConversationHandle, HandleState},
    token::{ConversationToken, TokenFormat},
};
pub use verdict::{
    entities::{FlaggedLocation, Verdict, VerdictKind},
    parsing::{MarkerGrammar, parse_verdict, reconcile},
};
pub use workflow::{
    checkpoint::{AdvancementPolicy, Checkpoint, CheckpointLabel},
    instance::{
        InstanceId, TransitionRecord, VerdictRecord, WorkflowInstance, WorkflowState,
        WorkflowStatus,
    },
    plan::CheckpointPlan,
};
