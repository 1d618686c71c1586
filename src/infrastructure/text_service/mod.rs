//! Generative text service adapters

mod gemini;

pub use gemini::{GeminiClient, DEFAULT_API_BASE_URL};
