//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod checkpoint_scheduler;
pub mod consult_role;
