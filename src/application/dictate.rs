//! Dictate bio use case
//!
//! Records the microphone through a capture controller and hands the audio to
//! the transcription service.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::capture_controller::{CaptureController, Delivery};
use super::ports::{ArtifactStore, MediaDevices, RecorderFactory, ServiceError, Transcriber};
use super::status::StatusBroadcaster;
use crate::domain::error::CaptureError;
use crate::domain::status::Status;

/// Errors from the dictation use case
#[derive(Debug, Error)]
pub enum DictateError {
    #[error("{0}")]
    Capture(#[from] CaptureError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Not recording")]
    NotRecording,

    #[error("Nothing was recorded")]
    NothingRecorded,

    #[error("Missing API key. Set GEMINI_API_KEY or configure via 'bio-prompter config set api_key <key>'")]
    MissingApiKey,
}

/// Output from a dictation
#[derive(Debug, Clone)]
pub struct DictationOutput {
    pub text: String,
    pub audio_size: String,
    pub elapsed_secs: u64,
}

pub struct DictateBioUseCase<D, F, S, T>
where
    D: MediaDevices,
    F: RecorderFactory,
    S: ArtifactStore,
    T: Transcriber,
{
    controller: Arc<CaptureController<D, F, S>>,
    transcriber: T,
    status: Option<StatusBroadcaster>,
}

impl<D, F, S, T> DictateBioUseCase<D, F, S, T>
where
    D: MediaDevices,
    F: RecorderFactory,
    S: ArtifactStore,
    T: Transcriber,
{
    pub fn new(controller: Arc<CaptureController<D, F, S>>, transcriber: T) -> Self {
        Self {
            controller,
            transcriber,
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusBroadcaster) -> Self {
        self.status = Some(status);
        self
    }

    pub fn controller(&self) -> &Arc<CaptureController<D, F, S>> {
        &self.controller
    }

    pub async fn start(&self) -> Result<(), DictateError> {
        self.controller.start().await?;
        Ok(())
    }

    /// Stop recording and transcribe what was said
    pub async fn finish(&self) -> Result<DictationOutput, DictateError> {
        let capture = self
            .controller
            .stop()
            .await?
            .ok_or(DictateError::NotRecording)?;
        if capture.artifact.is_empty() {
            return Err(DictateError::NothingRecorded);
        }

        let audio_base64 = match &capture.delivery {
            Delivery::Base64(payload) => payload.clone(),
            Delivery::Download { .. } => capture.artifact.to_base64(),
        };
        let audio_size = capture.artifact.human_readable_size();

        self.set_status(Status::Transcribing);
        info!(size = %audio_size, mime = capture.artifact.mime_type(), "transcribing dictation");

        match self
            .transcriber
            .transcribe(&audio_base64, capture.artifact.mime_type())
            .await
        {
            Ok(text) => {
                self.set_status(Status::Idle);
                Ok(DictationOutput {
                    text,
                    audio_size,
                    elapsed_secs: capture.elapsed_secs,
                })
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
