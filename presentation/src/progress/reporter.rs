//! Progress reporting for consultations
//!
//! Agents may take ten minutes or more, so every in-flight role gets its own
//! spinner with the elapsed time.

use colored::Colorize;
use devgate_application::ConsultationProgress;
use devgate_domain::{CheckpointLabel, RoleId, TransportOutcome, VerdictKind};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Reports progress with one spinner per consulted role
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<RoleId, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn done_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {prefix:.bold} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn status(outcome: &TransportOutcome, verdict: Option<VerdictKind>) -> String {
        match (outcome, verdict) {
            (TransportOutcome::Ok, Some(kind)) if kind.is_satisfying() => {
                format!("{} {}", "v".green(), kind)
            }
            (TransportOutcome::Ok, Some(kind)) => format!("{} {}", "x".red(), kind),
            (TransportOutcome::Ok, None) => format!("{} done", "v".green()),
            (other, _) => format!("{} {}", "x".red(), other),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsultationProgress for ProgressReporter {
    fn on_checkpoint_start(&self, label: CheckpointLabel, roles: &[RoleId]) {
        let _ = self.multi.println(format!(
            "{} {} ({})",
            "->".cyan(),
            format!("Checkpoint {}", label).bold(),
            label.description()
        ));
        if roles.is_empty() {
            let _ = self
                .multi
                .println(format!("  {}", "every required role already approved".dimmed()));
        }
    }

    fn on_consultation_start(&self, role: &RoleId, _checkpoint: Option<CheckpointLabel>) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(format!("{:<16}", role.as_str()));
        pb.set_message("waiting for verdict...");
        pb.enable_steady_tick(Duration::from_millis(120));

        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = bars.insert(role.clone(), pb) {
            previous.finish_and_clear();
        }
    }

    fn on_consultation_complete(
        &self,
        role: &RoleId,
        outcome: &TransportOutcome,
        verdict: Option<VerdictKind>,
    ) {
        let pb = self
            .bars
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(role);
        if let Some(pb) = pb {
            pb.set_style(Self::done_style());
            pb.finish_with_message(Self::status(outcome, verdict));
        }
    }

    fn on_checkpoint_complete(&self, _label: CheckpointLabel) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        for (_, pb) in bars.drain() {
            pb.finish_and_clear();
        }
    }
}

/// Simple line-based progress for non-interactive stderr
pub struct SimpleProgress;

impl ConsultationProgress for SimpleProgress {
    fn on_checkpoint_start(&self, label: CheckpointLabel, roles: &[RoleId]) {
        let roles = roles
            .iter()
            .map(RoleId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!(
            "{} {} ({})",
            "->".cyan(),
            format!("Checkpoint {}", label).bold(),
            if roles.is_empty() { "no consultation needed" } else { roles.as_str() }
        );
    }

    fn on_consultation_start(&self, role: &RoleId, _checkpoint: Option<CheckpointLabel>) {
        eprintln!("  {} consulting {}", "..".dimmed(), role);
    }

    fn on_consultation_complete(
        &self,
        role: &RoleId,
        outcome: &TransportOutcome,
        verdict: Option<VerdictKind>,
    ) {
        eprintln!("  {} {}", ProgressReporter::status(outcome, verdict), role);
    }
}
