//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`time`]: millisecond wall-clock helpers used for handle bookkeeping

pub mod error;
pub mod time;
