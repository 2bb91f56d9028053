//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod agent_transport;
pub mod conversation_logger;
pub mod progress;
pub mod prompt_source;
pub mod workflow_repository;
