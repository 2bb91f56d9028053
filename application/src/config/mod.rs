//! Application-level configuration.
//!
//! - [`GateParams`]: session store and scheduler control (token format, idle TTL)

pub mod gate_params;

pub use gate_params::GateParams;
