//! Prompt source adapters

mod file_source;

pub use file_source::FilePromptSource;
