//! Generate script use case

use thiserror::Error;
use tracing::info;

use super::ports::{ScriptWriter, ServiceError};
use super::status::StatusBroadcaster;
use crate::domain::error::CaptureError;
use crate::domain::status::Status;

/// Errors from the script use case
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("The bio is empty; write or dictate one first")]
    EmptyBio,

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Missing API key. Set GEMINI_API_KEY or configure via 'bio-prompter config set api_key <key>'")]
    MissingApiKey,
}

/// Bio to spoken script
pub struct GenerateScriptUseCase<W: ScriptWriter> {
    writer: W,
    status: Option<StatusBroadcaster>,
}

impl<W: ScriptWriter> GenerateScriptUseCase<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusBroadcaster) -> Self {
        self.status = Some(status);
        self
    }

    /// Write a script for `bio`, optionally following a refinement request
    pub async fn execute(&self, bio: &str, refinement: Option<&str>) -> Result<String, ScriptError> {
        let bio = bio.trim();
        if bio.is_empty() {
            return Err(ScriptError::EmptyBio);
        }

        self.set_status(Status::Transcribing);
        match self.writer.write_script(bio, refinement).await {
            Ok(script) => {
                info!(chars = script.len(), refined = refinement.is_some(), "script generated");
                self.set_status(Status::Idle);
                Ok(script)
            }
            Err(e) => {
                if let Some(status) = &self.status {
                    status.raise(&CaptureError::from(e.clone()));
                }
                Err(e.into())
            }
        }
    }

    fn set_status(&self, status: Status) {
        if let Some(broadcaster) = &self.status {
            broadcaster.set(status);
        }
    }
}
