//! Launcher line protocol.
//!
//! The launcher prints one JSON object per line on stdout. Two dialects are
//! understood:
//!
//! | Meaning | Simple form | Event-stream form |
//! |---------|-------------|-------------------|
//! | conversation id | `{"type":"conversation","id":"conv_.."}` | `{"type":"thread.started","thread_id":"thread_.."}` |
//! | response text | `{"type":"message","text":".."}` | `{"type":"item.completed","item":{"type":"agent_message","text":".."}}` |
//! | failure | `{"type":"error","message":".."}` | `{"type":"turn.failed","error":{"message":".."}}` |
//!
//! Other JSON events are ignored. Lines that are not JSON are plain output
//! and become part of the response.

use super::error::{LauncherError, Result};
use devgate_application::AgentReply;
use devgate_domain::ConversationToken;
use serde_json::Value;

/// One classified stdout line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherEvent {
    Conversation(String),
    Message(String),
    /// Reported problem; fatal only when no response text follows
    Error(String),
    /// The agent gave up on the turn
    TurnFailed(String),
    Text(String),
    Ignored,
}

/// Classify a single stdout line
pub fn parse_line(line: &str) -> LauncherEvent {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LauncherEvent::Ignored;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return LauncherEvent::Text(line.trim_end().to_string());
    };
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return LauncherEvent::Ignored;
    };

    let text_of = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);

    match kind {
        "conversation" => text_of(&value, "id")
            .map(LauncherEvent::Conversation)
            .unwrap_or(LauncherEvent::Ignored),
        "thread.started" => text_of(&value, "thread_id")
            .map(LauncherEvent::Conversation)
            .unwrap_or(LauncherEvent::Ignored),
        "message" => text_of(&value, "text")
            .map(LauncherEvent::Message)
            .unwrap_or(LauncherEvent::Ignored),
        "item.completed" => {
            let Some(item) = value.get("item") else {
                return LauncherEvent::Ignored;
            };
            if item.get("type").and_then(Value::as_str) != Some("agent_message") {
                return LauncherEvent::Ignored;
            }
            text_of(item, "text")
                .map(LauncherEvent::Message)
                .unwrap_or(LauncherEvent::Ignored)
        }
        "error" => LauncherEvent::Error(
            text_of(&value, "message").unwrap_or_else(|| trimmed.to_string()),
        ),
        "turn.failed" => LauncherEvent::TurnFailed(
            value
                .get("error")
                .and_then(|e| text_of(e, "message"))
                .unwrap_or_else(|| "turn failed".to_string()),
        ),
        _ => LauncherEvent::Ignored,
    }
}

/// Accumulated stdout of one launcher run
#[derive(Debug, Default)]
pub struct Transcript {
    token: Option<String>,
    messages: Vec<String>,
    plain: Vec<String>,
    errors: Vec<String>,
    failure: Option<String>,
}

impl Transcript {
    pub fn push_line(&mut self, line: &str) {
        match parse_line(line) {
            LauncherEvent::Conversation(id) => {
                // The first reported id names the conversation
                if self.token.is_none() {
                    self.token = Some(id);
                }
            }
            LauncherEvent::Message(text) => self.messages.push(text),
            LauncherEvent::Error(message) => self.errors.push(message),
            LauncherEvent::TurnFailed(message) => self.failure = Some(message),
            LauncherEvent::Text(text) => self.plain.push(text),
            LauncherEvent::Ignored => {}
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Response text: the last agent message followed by any plain output
    pub fn response_text(&self) -> String {
        self.messages
            .last()
            .into_iter()
            .chain(self.plain.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_reply(self) -> Result<AgentReply> {
        if let Some(failure) = self.failure {
            return Err(LauncherError::AgentReported(failure));
        }
        let text = self.response_text();
        if text.trim().is_empty() {
            if !self.errors.is_empty() {
                return Err(LauncherError::AgentReported(self.errors.join("; ")));
            }
            return Err(LauncherError::EmptyResponse);
        }
        Ok(AgentReply {
            text,
            token: self.token.map(ConversationToken::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_dialect() {
        assert_eq!(
            parse_line(r#"{"type":"conversation","id":"conv_01ab"}"#),
            LauncherEvent::Conversation("conv_01ab".to_string())
        );
        assert_eq!(
            parse_line(r#"{"type":"message","text":"VERDICT: APPROVE"}"#),
            LauncherEvent::Message("VERDICT: APPROVE".to_string())
        );
        assert_eq!(
            parse_line(r#"{"type":"error","message":"rate limited"}"#),
            LauncherEvent::Error("rate limited".to_string())
        );
    }

    #[test]
    fn test_parse_event_stream_dialect() {
        assert_eq!(
            parse_line(r#"{"type":"thread.started","thread_id":"thread_9f"}"#),
            LauncherEvent::Conversation("thread_9f".to_string())
        );
        assert_eq!(
            parse_line(
                r#"{"type":"item.completed","item":{"id":"item_3","type":"agent_message","text":"LGTM"}}"#
            ),
            LauncherEvent::Message("LGTM".to_string())
        );
        assert_eq!(
            parse_line(
                r#"{"type":"item.completed","item":{"type":"reasoning","text":"thinking about bugs"}}"#
            ),
            LauncherEvent::Ignored
        );
        assert_eq!(
            parse_line(r#"{"type":"turn.failed","error":{"message":"session not found"}}"#),
            LauncherEvent::TurnFailed("session not found".to_string())
        );
        assert_eq!(parse_line(r#"{"type":"turn.started"}"#), LauncherEvent::Ignored);
    }

    #[test]
    fn test_non_json_line_is_text() {
        assert_eq!(
            parse_line("src/lib.rs:12 unchecked index\n"),
            LauncherEvent::Text("src/lib.rs:12 unchecked index".to_string())
        );
        assert_eq!(parse_line("   "), LauncherEvent::Ignored);
    }

    #[test]
    fn test_transcript_uses_last_message_and_first_id() {
        let mut transcript = Transcript::default();
        transcript.push_line(r#"{"type":"thread.started","thread_id":"thread_01"}"#);
        transcript.push_line(r#"{"type":"message","text":"Looking at the diff"}"#);
        transcript.push_line(r#"{"type":"conversation","id":"conv_02"}"#);
        transcript.push_line(r#"{"type":"message","text":"VERDICT: CONCERNS"}"#);
        transcript.push_line("note: a.rs:3");

        let reply = transcript.into_reply().unwrap();
        assert_eq!(reply.text, "VERDICT: CONCERNS\nnote: a.rs:3");
        assert_eq!(reply.token.unwrap().as_str(), "thread_01");
    }

    #[test]
    fn test_error_without_message_is_reported() {
        let mut transcript = Transcript::default();
        transcript.push_line(r#"{"type":"error","message":"conversation expired"}"#);
        match transcript.into_reply() {
            Err(LauncherError::AgentReported(message)) => {
                assert_eq!(message, "conversation expired")
            }
            other => panic!("unexpected {:?}", other.map(|r| r.text)),
        }
    }

    #[test]
    fn test_error_with_message_still_replies() {
        let mut transcript = Transcript::default();
        transcript.push_line(r#"{"type":"error","message":"retrying stream"}"#);
        transcript.push_line(r#"{"type":"message","text":"VERDICT: APPROVE"}"#);
        assert_eq!(transcript.errors().len(), 1);
        assert_eq!(transcript.into_reply().unwrap().text, "VERDICT: APPROVE");
    }

    #[test]
    fn test_turn_failed_wins_over_text() {
        let mut transcript = Transcript::default();
        transcript.push_line(r#"{"type":"message","text":"partial"}"#);
        transcript.push_line(r#"{"type":"turn.failed","error":{"message":"quota exceeded"}}"#);
        assert!(matches!(
            transcript.into_reply(),
            Err(LauncherError::AgentReported(_))
        ));
    }

    #[test]
    fn test_empty_output() {
        let transcript = Transcript::default();
        assert!(matches!(
            transcript.into_reply(),
            Err(LauncherError::EmptyResponse)
        ));
    }
}
