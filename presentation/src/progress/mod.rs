//! Progress display for long-running consultations

pub mod reporter;
