//! Prompt value objects for the text service

/// Instruction for turning a bio into a spoken script
const SCRIPT_INSTRUCTION: &str = r#"You write short spoken introductions for people recording themselves on camera.

Instructions:
- Turn the biography you are given into a script of 30 to 60 seconds when read aloud
- Write in the first person, in a warm and natural speaking voice
- Use short sentences that are easy to read from a prompter
- Keep every fact from the biography; do NOT invent new ones
- Output ONLY the script text, without headings, stage directions or quotes"#;

/// Instruction for transcribing a dictated bio
const TRANSCRIPTION_INSTRUCTION: &str = r#"You are a voice-to-text assistant that transcribes a spoken biography.

Instructions:
- Remove filler words (um, ah, like, you know)
- Must have correct grammar and punctuation
- Do NOT transcribe stutters, false starts, or repeated words
- Output ONLY the final cleaned text
- Do NOT include meta-commentary or explanations"#;

/// System prompt for script generation, optionally carrying a refinement
/// request ("make it shorter", "more formal", ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPrompt {
    content: String,
}

impl ScriptPrompt {
    pub fn build(refinement: Option<&str>) -> Self {
        let content = match refinement.map(str::trim).filter(|r| !r.is_empty()) {
            Some(refinement) => format!(
                "{}\n\nAdditional request from the speaker: {}",
                SCRIPT_INSTRUCTION, refinement
            ),
            None => SCRIPT_INSTRUCTION.to_string(),
        };
        Self { content }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl Default for ScriptPrompt {
    fn default() -> Self {
        Self::build(None)
    }
}

/// System prompt for bio dictation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionPrompt {
    content: String,
}

impl TranscriptionPrompt {
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl Default for TranscriptionPrompt {
    fn default() -> Self {
        Self {
            content: TRANSCRIPTION_INSTRUCTION.to_string(),
        }
    }
}
