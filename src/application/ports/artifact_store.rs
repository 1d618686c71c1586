//! Artifact store port interface

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::capture::Artifact;
use crate::domain::error::CaptureError;

/// Artifact store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Failed to store recording: {0}")]
    WriteFailed(String),
}

impl From<StoreError> for CaptureError {
    fn from(err: StoreError) -> Self {
        CaptureError::Unknown(err.to_string())
    }
}

/// Reusable reference to a published artifact (a file path or an object URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    uri: String,
}

impl ArtifactRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Port for making artifacts available for playback or download
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Publish an artifact under the suggested filename
    async fn publish(&self, artifact: &Artifact, filename: &str) -> Result<ArtifactRef, StoreError>;

    /// Release the backing resource. Best-effort; unknown references are ignored.
    async fn revoke(&self, reference: &ArtifactRef);
}
