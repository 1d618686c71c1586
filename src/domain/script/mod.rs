//! Script domain module

mod prompt;

pub use prompt::{ScriptPrompt, TranscriptionPrompt};
