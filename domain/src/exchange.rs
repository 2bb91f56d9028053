//! A single request/response round trip with an external agent

use crate::role::value_objects::RoleId;
use crate::session::token::ConversationToken;
use crate::workflow::checkpoint::CheckpointLabel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Tagged result of a transport call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum TransportOutcome {
    Ok,
    /// The latency ceiling elapsed before a response arrived
    Timeout { after_secs: u64 },
    /// The handle failed the pre-send check; nothing was sent
    MalformedHandle { reason: String },
    /// The agent process could not be reached, crashed, or reported an error
    AgentError { diagnostic: String },
    /// Abandoned because the workflow was aborted
    Cancelled,
}

impl TransportOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransportOutcome::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportOutcome::Ok => "ok",
            TransportOutcome::Timeout { .. } => "timeout",
            TransportOutcome::MalformedHandle { .. } => "malformed-handle",
            TransportOutcome::AgentError { .. } => "agent-error",
            TransportOutcome::Cancelled => "cancelled",
        }
    }

    /// Reason string carried by a hold
    pub fn hold_reason(&self) -> String {
        match self {
            TransportOutcome::Ok => "ok".to_string(),
            TransportOutcome::Timeout { .. } => "Timeout".to_string(),
            TransportOutcome::MalformedHandle { reason } => format!("MalformedHandle: {}", reason),
            TransportOutcome::AgentError { diagnostic } => format!("AgentError: {}", diagnostic),
            TransportOutcome::Cancelled => "Cancelled".to_string(),
        }
    }
}

impl fmt::Display for TransportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportOutcome::Timeout { after_secs } => write!(f, "timeout after {}s", after_secs),
            TransportOutcome::MalformedHandle { reason } => write!(f, "malformed handle: {}", reason),
            TransportOutcome::AgentError { diagnostic } => write!(f, "agent error: {}", diagnostic),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Request, response and outcome of one consultation call
///
/// Ephemeral: consumed by the reconciler and written to the audit log only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentExchange {
    pub role: RoleId,
    pub checkpoint: Option<CheckpointLabel>,
    pub prompt: String,
    pub response: Option<String>,
    #[serde(with = "duration_millis")]
    pub latency: Duration,
    pub outcome: TransportOutcome,
    /// Conversation identifier the agent reported, if any
    pub reported_token: Option<ConversationToken>,
}

impl AgentExchange {
    pub fn new(role: RoleId, checkpoint: Option<CheckpointLabel>, prompt: impl Into<String>) -> Self {
        Self {
            role,
            checkpoint,
            prompt: prompt.into(),
            response: None,
            latency: Duration::ZERO,
            outcome: TransportOutcome::Ok,
            reported_token: None,
        }
    }

    pub fn succeeded(
        mut self,
        response: impl Into<String>,
        token: Option<ConversationToken>,
        latency: Duration,
    ) -> Self {
        self.response = Some(response.into());
        self.reported_token = token;
        self.latency = latency;
        self.outcome = TransportOutcome::Ok;
        self
    }

    pub fn failed(mut self, outcome: TransportOutcome, latency: Duration) -> Self {
        self.outcome = outcome;
        self.latency = latency;
        self
    }

    pub fn response_text(&self) -> &str {
        self.response.as_deref().unwrap_or("")
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
