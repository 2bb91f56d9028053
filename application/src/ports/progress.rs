//! Progress notification port
//!
//! Consultations can take minutes. Implementations live in the presentation
//! layer and show which roles are still being waited on.

use devgate_domain::{CheckpointLabel, RoleId, TransportOutcome, VerdictKind};

pub trait ConsultationProgress: Send + Sync {
    /// Called once per checkpoint evaluation with the roles about to be consulted
    fn on_checkpoint_start(&self, _label: CheckpointLabel, _roles: &[RoleId]) {}

    /// Called when a consultation with `role` begins
    fn on_consultation_start(&self, role: &RoleId, checkpoint: Option<CheckpointLabel>);

    /// Called when a consultation ends, successfully or not
    fn on_consultation_complete(
        &self,
        role: &RoleId,
        outcome: &TransportOutcome,
        verdict: Option<VerdictKind>,
    );

    /// Called after all consultations of a checkpoint have returned
    fn on_checkpoint_complete(&self, _label: CheckpointLabel) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ConsultationProgress for NoProgress {
    fn on_consultation_start(&self, _role: &RoleId, _checkpoint: Option<CheckpointLabel>) {}

    fn on_consultation_complete(
        &self,
        _role: &RoleId,
        _outcome: &TransportOutcome,
        _verdict: Option<VerdictKind>,
    ) {
    }
}
