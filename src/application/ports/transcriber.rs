//! Text service port interfaces

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::error::CaptureError;

/// Text service errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("The service returned no text")]
    EmptyResponse,

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl ServiceError {
    /// The call went through but produced nothing usable
    pub fn is_empty_output(&self) -> bool {
        matches!(self, Self::EmptyResponse)
    }
}

impl From<ServiceError> for CaptureError {
    fn from(err: ServiceError) -> Self {
        CaptureError::ServiceFailure(err.to_string())
    }
}

/// Port for audio transcription
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe base64-encoded audio of the given mime type to text.
    async fn transcribe(&self, audio_base64: &str, mime_type: &str)
        -> Result<String, ServiceError>;
}

/// Port for script generation
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    /// Turn a bio into a spoken script, optionally following a refinement
    /// instruction.
    async fn write_script(
        &self,
        bio: &str,
        refinement: Option<&str>,
    ) -> Result<String, ServiceError>;
}
