//! Verdict domain
//!
//! - [`entities::Verdict`]: kind, rationale and flagged locations
//! - [`parsing`]: the reconciler grammar with its fail-closed default

pub mod entities;
pub mod parsing;
