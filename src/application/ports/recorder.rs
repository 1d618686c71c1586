//! Media recorder port interfaces

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::devices::DeviceStream;
use crate::domain::error::CaptureError;

/// Recorder errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error("Recorder cannot produce {0}")]
    UnsupportedMimeType(String),

    #[error("Failed to start recorder: {0}")]
    StartFailed(String),
}

impl From<RecorderError> for CaptureError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::UnsupportedMimeType(_) => CaptureError::UnsupportedCodec,
            RecorderError::StartFailed(detail) => CaptureError::Unknown(detail),
        }
    }
}

/// Events a running recorder delivers, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Next piece of the encoded container
    Data(Vec<u8>),
    /// The stop request was acknowledged; no more data follows
    Stopped,
    /// Recording broke off; no more data follows
    Failed(String),
}

/// Sender half handed to a recorder on start
pub type RecorderEvents = mpsc::UnboundedSender<RecorderEvent>;

/// A recorder bound to one stream and one mime type.
///
/// `start` resolves once the backend is producing data. After `request_stop`
/// the recorder flushes any pending data and then sends exactly one `Stopped`
/// (or `Failed`).
#[async_trait]
pub trait MediaRecorder: Send {
    async fn start(&mut self, events: RecorderEvents) -> Result<(), RecorderError>;

    fn request_stop(&mut self);
}

/// Port for creating recorders
pub trait RecorderFactory: Send + Sync {
    fn create(
        &self,
        stream: &DeviceStream,
        mime_type: &str,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError>;
}
