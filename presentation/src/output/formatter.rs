//! Output formatter trait

use crate::output::console::ConsoleFormatter;
use devgate_application::{Consultation, Outcome};
use devgate_domain::{ConfigIssue, ConversationHandle, OutputFormat, WorkflowInstance};
use serde_json::{Value, json};

/// Trait for rendering command results
pub trait OutputFormatter {
    /// Result of `check`, `abort` and explicit skips
    fn format_outcome(&self, outcome: &Outcome) -> String;

    /// Result of an out-of-band consultation
    fn format_consultation(&self, consultation: &Consultation) -> String;

    /// Position, verdicts and conversations of a workflow
    fn format_status(&self, instance: &WorkflowInstance, handles: &[ConversationHandle]) -> String;

    /// Configuration validation report
    fn format_issues(&self, issues: &[ConfigIssue]) -> String;
}

/// Pick the formatter for `format`
pub fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// One pretty-printed JSON document per command
pub struct JsonFormatter;

impl JsonFormatter {
    fn render(value: &Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_outcome(&self, outcome: &Outcome) -> String {
        serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_consultation(&self, consultation: &Consultation) -> String {
        let exchange = &consultation.exchange;
        Self::render(&json!({
            "role": exchange.role,
            "outcome": exchange.outcome,
            "verdict": exchange.outcome.is_ok().then_some(&consultation.verdict),
            "latency_ms": exchange.latency.as_millis() as u64,
            "fresh_session": consultation.fresh_session,
            "token": exchange.reported_token,
            "response": exchange.response,
        }))
    }

    fn format_status(&self, instance: &WorkflowInstance, handles: &[ConversationHandle]) -> String {
        Self::render(&json!({
            "status": instance.status(),
            "current": instance.current_checkpoint().map(|c| c.label),
            "instance": instance,
            "conversations": handles,
        }))
    }

    fn format_issues(&self, issues: &[ConfigIssue]) -> String {
        let issues: Vec<Value> = issues
            .iter()
            .map(|issue| {
                json!({
                    "severity": if issue.is_error() { "error" } else { "warning" },
                    "message": issue.message,
                })
            })
            .collect();
        let valid = !issues.iter().any(|i| i["severity"] == "error");
        Self::render(&json!({ "valid": valid, "issues": issues }))
    }
}
