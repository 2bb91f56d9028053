//! Consultation prompt templates

use crate::workflow::checkpoint::CheckpointLabel;

/// Response format the reconciler understands, appended to every request
const FORMAT_INSTRUCTIONS: &str = r#"## Response format

End your response with exactly one verdict line:

VERDICT: APPROVE | CONCERNS | BUGS FOUND | BLOCKED

- APPROVE: no issues worth raising.
- CONCERNS: acceptable to proceed, but list what should be improved.
- BUGS FOUND: defects that must be fixed before proceeding; itemize them.
- BLOCKED: the work cannot proceed as designed; explain why.

Reference code as `path/to/file.rs:LINE` (or `:START-END`) so findings can be located."#;

const FORMAT_REMINDER: &str =
    "Reply with the same format as before, ending with a `VERDICT:` line.";

/// Builder for the text sent to an agent
///
/// A fresh session carries the role's prompt text; a continuation relies on
/// the conversation the agent already holds and only sends what is new.
#[derive(Debug, Clone, Default)]
pub struct ConsultationPrompt {
    role_prompt: Option<String>,
    checkpoint: Option<CheckpointLabel>,
    revision: Option<String>,
    context: Option<String>,
}

impl ConsultationPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Role prompt text, only included for fresh sessions
    pub fn with_role_prompt(mut self, text: impl Into<String>) -> Self {
        self.role_prompt = Some(text.into());
        self
    }

    pub fn for_checkpoint(mut self, label: CheckpointLabel) -> Self {
        self.checkpoint = Some(label);
        self
    }

    pub fn at_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        if !context.trim().is_empty() {
            self.context = Some(context);
        }
        self
    }

    /// Render for a session with no conversation yet
    pub fn render_fresh(&self) -> String {
        let mut sections = Vec::new();
        if let Some(role_prompt) = &self.role_prompt {
            sections.push(role_prompt.trim().to_string());
        }
        sections.extend(self.header());
        sections.extend(self.context_section());
        sections.push(FORMAT_INSTRUCTIONS.to_string());
        sections.join("\n\n")
    }

    /// Render a follow-up in an existing conversation
    pub fn render_continuation(&self) -> String {
        let mut sections = Vec::new();
        sections.extend(self.header());
        sections.extend(self.context_section());
        sections.push(FORMAT_REMINDER.to_string());
        sections.join("\n\n")
    }

    pub fn render(&self, fresh: bool) -> String {
        if fresh {
            self.render_fresh()
        } else {
            self.render_continuation()
        }
    }

    fn header(&self) -> Option<String> {
        let label = self.checkpoint?;
        let mut header = format!("# Checkpoint {}: {}", label, label.description());
        if let Some(revision) = &self.revision {
            header.push_str(&format!("\n\nRevision under review: {}", revision));
        }
        Some(header)
    }

    fn context_section(&self) -> Option<String> {
        self.context
            .as_ref()
            .map(|context| format!("## Context\n\n{}", context.trim()))
    }
}
