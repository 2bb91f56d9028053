//! Workflow domain
//!
//! - [`checkpoint`]: the fixed label set `0, T-1, T, T+1, L-1, L` and checkpoint definitions
//! - [`plan::CheckpointPlan`]: checkpoint → role mapping, validated at startup
//! - [`instance::WorkflowInstance`]: the ordered state machine owned by the caller

pub mod checkpoint;
pub mod instance;
pub mod plan;
