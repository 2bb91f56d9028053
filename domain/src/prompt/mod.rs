//! Prompt domain
//!
//! Assembles the text sent to an agent for a consultation.

mod template;

pub use template::ConsultationPrompt;
