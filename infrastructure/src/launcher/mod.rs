//! Agent launcher adapter
//!
//! Runs the external agent as a child process per consultation.

pub mod error;
pub mod protocol;
pub mod transport;
