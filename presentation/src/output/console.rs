//! Console output formatter for gate results

use crate::output::formatter::OutputFormatter;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use devgate_application::{CheckpointReport, Consultation, Outcome, RoleResult};
use devgate_domain::{
    ConfigIssue, ConversationHandle, HandleState, Millis, VerdictKind, WorkflowInstance,
    WorkflowStatus,
};

/// Formats gate results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn verdict_label(kind: VerdictKind) -> String {
        match kind {
            VerdictKind::Approve => kind.as_str().green().bold().to_string(),
            VerdictKind::Concerns => kind.as_str().yellow().bold().to_string(),
            VerdictKind::BugsFound | VerdictKind::Blocked => kind.as_str().red().bold().to_string(),
            VerdictKind::Inconclusive => kind.as_str().magenta().bold().to_string(),
        }
    }

    fn timestamp(millis: Millis) -> String {
        DateTime::<Utc>::from_timestamp_millis(millis as i64)
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| millis.to_string())
    }

    fn role_line(result: &RoleResult) -> String {
        let role = format!("{:<16}", result.role.as_str());
        if result.carried_over {
            return format!(
                "  {} {} {}",
                "v".green(),
                role,
                "approved earlier for this revision".dimmed()
            );
        }
        if !result.outcome.is_ok() {
            return format!("  {} {} {}", "x".red(), role, result.outcome.to_string().red());
        }
        let Some(verdict) = &result.verdict else {
            return format!("  {} {}", "?".magenta(), role);
        };
        let mark = if verdict.is_satisfying() {
            "v".green()
        } else {
            "x".red()
        };
        let mut line = format!(
            "  {} {} {} {}",
            mark,
            role,
            Self::verdict_label(verdict.kind),
            format!("({:.1}s)", result.latency_ms as f64 / 1000.0).dimmed()
        );
        let headline = verdict.headline();
        if !headline.is_empty() {
            line.push_str(&format!("\n      {}", headline));
        }
        for location in &verdict.locations {
            line.push_str(&format!("\n      {} {}", "->".dimmed(), location));
        }
        line
    }

    fn report(report: &CheckpointReport) -> String {
        let mut output = format!(
            "{} {}  {} {}\n",
            "Checkpoint:".cyan().bold(),
            report.checkpoint,
            "Revision:".cyan().bold(),
            report.revision
        );
        if report.skipped {
            output.push_str(&format!(
                "  {}\n",
                "passed without consultation (change below threshold)".dimmed()
            ));
        }
        for result in &report.results {
            output.push_str(&Self::role_line(result));
            output.push('\n');
        }
        output
    }

    fn handle_line(handle: &ConversationHandle) -> String {
        let state = match handle.state() {
            HandleState::Active if handle.is_pending_creation() => "pending".yellow(),
            HandleState::Active => "active".green(),
            HandleState::Expired => "expired".dimmed(),
            HandleState::Invalid => "invalid".red(),
        };
        let token = handle
            .token()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "  {:<16} {:<10} {:<24} last activity {}",
            handle.role().as_str(),
            state,
            token,
            Self::timestamp(handle.last_activity())
        );
        if let Some(reason) = handle.invalid_reason() {
            line.push_str(&format!(" ({})", reason));
        }
        line
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_outcome(&self, outcome: &Outcome) -> String {
        let mut output = String::new();
        match outcome {
            Outcome::Advanced { report, next } => {
                output.push_str(&Self::report(report));
                output.push_str(&format!(
                    "\n{} {} -> {}\n",
                    "ADVANCED".green().bold(),
                    report.checkpoint,
                    next
                ));
            }
            Outcome::Completed { report } => {
                output.push_str(&Self::report(report));
                output.push_str(&format!(
                    "\n{} every checkpoint passed\n",
                    "COMPLETED".green().bold()
                ));
            }
            Outcome::Held { report, reason } => {
                output.push_str(&Self::report(report));
                output.push_str(&format!("\n{} {}\n", "HELD".red().bold(), reason));
                output.push_str(&format!(
                    "{}\n",
                    "Address the findings and run the check again.".dimmed()
                ));
            }
            Outcome::Aborted { checkpoint, reason } => {
                let at = checkpoint
                    .map(|c| format!(" at {}", c))
                    .unwrap_or_default();
                output.push_str(&format!("{}{}: {}\n", "ABORTED".red().bold(), at, reason));
            }
        }
        output
    }

    fn format_consultation(&self, consultation: &Consultation) -> String {
        let exchange = &consultation.exchange;
        let mut output = format!(
            "{}\n",
            format!("── {} ──", exchange.role).yellow().bold()
        );
        if !exchange.outcome.is_ok() {
            output.push_str(&format!("{}\n", exchange.outcome.to_string().red()));
            return output;
        }
        output.push_str(&format!(
            "{} {}  {}\n\n",
            "Verdict:".cyan().bold(),
            Self::verdict_label(consultation.verdict.kind),
            format!("({:.1}s)", exchange.latency.as_secs_f64()).dimmed()
        ));
        output.push_str(exchange.response_text());
        output.push('\n');
        output
    }

    fn format_status(&self, instance: &WorkflowInstance, handles: &[ConversationHandle]) -> String {
        let mut output = Self::header(&format!("Workflow {}", instance.id()));
        output.push('\n');

        let status = match instance.status() {
            WorkflowStatus::Completed => "completed".green().bold(),
            WorkflowStatus::Aborted => "aborted".red().bold(),
            other => other.as_str().yellow().bold(),
        };
        output.push_str(&format!(
            "{} {}  {} {}\n",
            "Status:".cyan().bold(),
            status,
            "Started:".cyan().bold(),
            Self::timestamp(instance.created_at())
        ));
        if let Some(reason) = instance.abort_reason() {
            output.push_str(&format!("{} {}\n", "Reason:".cyan().bold(), reason));
        }

        output.push_str(&Self::section_header("Checkpoints"));
        let position = instance.position();
        let completed = instance.status() == WorkflowStatus::Completed;
        for (index, checkpoint) in instance.checkpoints().iter().enumerate() {
            let mark = match position {
                Some(p) if index < p => "v".green(),
                Some(p) if index == p => ">".yellow().bold(),
                None if completed => "v".green(),
                _ => ".".dimmed(),
            };
            let roles = checkpoint
                .required_roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!(
                "  {} {:<4} {:<46} {}\n",
                mark,
                checkpoint.label.as_str(),
                checkpoint.label.description(),
                roles.dimmed()
            ));
            if !checkpoint.policy.is_mandatory() {
                output.push_str(&format!("         {}\n", checkpoint.policy.to_string().dimmed()));
            }
        }

        if !instance.verdicts().is_empty() {
            output.push_str(&Self::section_header("Verdicts"));
            for record in instance.verdicts() {
                output.push_str(&format!(
                    "  {:<4} {:<16} {:<14} rev {}\n",
                    record.checkpoint.as_str(),
                    record.role.as_str(),
                    Self::verdict_label(record.kind),
                    record.revision
                ));
            }
        }

        if !handles.is_empty() {
            output.push_str(&Self::section_header("Conversations"));
            for handle in handles {
                output.push_str(&Self::handle_line(handle));
                output.push('\n');
            }
        }

        output
    }

    fn format_issues(&self, issues: &[ConfigIssue]) -> String {
        if issues.is_empty() {
            return format!("{} configuration is valid\n", "v".green());
        }
        let mut output = String::new();
        for issue in issues {
            let label = if issue.is_error() {
                "error".red().bold()
            } else {
                "warning".yellow().bold()
            };
            output.push_str(&format!("{}: {}\n", label, issue.message));
        }
        let errors = issues.iter().filter(|i| i.is_error()).count();
        if errors > 0 {
            output.push_str(&format!("\n{} error(s); configuration is not usable\n", errors));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devgate_domain::{
        CheckpointLabel, CheckpointPlan, InstanceId, RoleId, TransportOutcome, Verdict,
    };

    fn plain() {
        colored::control::set_override(false);
    }

    fn report(results: Vec<RoleResult>) -> CheckpointReport {
        CheckpointReport {
            checkpoint: CheckpointLabel::Tests,
            revision: "abc123".to_string(),
            results,
            skipped: false,
        }
    }

    #[test]
    fn test_indent() {
        assert_eq!(ConsoleFormatter::indent("a\nb", "  "), "  a\n  b");
    }

    #[test]
    fn test_held_outcome_lists_roles_and_reason() {
        plain();
        let outcome = Outcome::Held {
            report: report(vec![
                RoleResult {
                    role: RoleId::architect(),
                    outcome: TransportOutcome::Ok,
                    verdict: None,
                    latency_ms: 0,
                    carried_over: true,
                },
                RoleResult {
                    role: RoleId::reviewer(),
                    outcome: TransportOutcome::Timeout { after_secs: 600 },
                    verdict: None,
                    latency_ms: 600_000,
                    carried_over: false,
                },
            ]),
            reason: "Timeout".to_string(),
        };
        let text = ConsoleFormatter.format_outcome(&outcome);
        assert!(text.contains("HELD Timeout"));
        assert!(text.contains("approved earlier for this revision"));
        assert!(text.contains("timeout after 600s"));
    }

    #[test]
    fn test_advanced_outcome_shows_verdict_headline() {
        plain();
        let outcome = Outcome::Advanced {
            report: report(vec![RoleResult {
                role: RoleId::reviewer(),
                outcome: TransportOutcome::Ok,
                verdict: Some(Verdict::new(VerdictKind::Approve, "\nLooks good.\nShip it.")),
                latency_ms: 2500,
                carried_over: false,
            }]),
            next: CheckpointLabel::Implementation,
        };
        let text = ConsoleFormatter.format_outcome(&outcome);
        assert!(text.contains("ADVANCED T -> T+1"));
        assert!(text.contains("approve"));
        assert!(text.contains("(2.5s)"));
        assert!(text.contains("Looks good."));
        assert!(!text.contains("Ship it."));
    }

    #[test]
    fn test_aborted_outcome() {
        plain();
        let outcome = Outcome::Aborted {
            checkpoint: Some(CheckpointLabel::Design),
            reason: "operator".to_string(),
        };
        assert_eq!(
            ConsoleFormatter.format_outcome(&outcome),
            "ABORTED at 0: operator\n"
        );
    }

    #[test]
    fn test_status_marks_current_checkpoint() {
        plain();
        let plan = CheckpointPlan::from_labels(&[CheckpointLabel::Design, CheckpointLabel::Tests]);
        let instance = WorkflowInstance::new(InstanceId::new("wf-7"), plan, 0).unwrap();
        let text = ConsoleFormatter.format_status(&instance, &[]);
        assert!(text.contains("Workflow wf-7"));
        assert!(text.contains("Status: pending"));
        assert!(text.contains("> 0"));
        assert!(text.contains(". T "));
        assert!(!text.contains("Conversations"));
    }

    #[test]
    fn test_issues_report() {
        plain();
        assert!(ConsoleFormatter.format_issues(&[]).contains("valid"));
        let issues = vec![ConfigIssue::error(
            devgate_domain::ConfigIssueCode::InvalidWorkflow,
            "workflow: empty",
        )];
        let text = ConsoleFormatter.format_issues(&issues);
        assert!(text.contains("error: workflow: empty"));
        assert!(text.contains("1 error(s)"));
    }
}
