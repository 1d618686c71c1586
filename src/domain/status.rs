//! Status reported to the UI

use std::fmt;

use super::error::CaptureError;

/// Coarse state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Idle,
    Recording,
    Finalizing,
    Transcribing,
    Error,
}

impl Status {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Transcribing => "transcribing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const PERMISSION_HINT: &str = "Capture access is blocked. To fix it:\n  \
    1. Open the site or system privacy settings for this application\n  \
    2. Set Camera and Microphone to \"Allow\"\n  \
    3. Come back and start the recording again";

/// Snapshot of the shared status.
///
/// `message` and `hint` are only set for `Status::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub status: Status,
    pub message: Option<String>,
    pub hint: Option<String>,
    pub permission_related: bool,
}

impl StatusReport {
    /// Plain lifecycle status without error details
    pub fn of(status: Status) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn idle() -> Self {
        Self::of(Status::Idle)
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Map a failure into an error report with user guidance
    pub fn from_error(error: &CaptureError) -> Self {
        let (message, hint) = match error {
            CaptureError::PermissionDenied => (
                "Camera or microphone access was denied.".to_string(),
                PERMISSION_HINT.to_string(),
            ),
            CaptureError::DeviceNotFound => (
                "No camera or microphone was found.".to_string(),
                "Connect a device, make sure no other application is using it, then try again."
                    .to_string(),
            ),
            CaptureError::InsecureContext => (
                "Recording is only available from a secure context.".to_string(),
                "Open the application over HTTPS or from localhost.".to_string(),
            ),
            CaptureError::UnsupportedCapability(detail) => (
                format!("Recording is not supported here: {}.", detail),
                "Install ffmpeg for camera capture, or record with --audio-only.".to_string(),
            ),
            CaptureError::UnsupportedCodec => (
                "No supported recording format is available.".to_string(),
                "Use a recent browser or a host with a supported capture device.".to_string(),
            ),
            CaptureError::NoActiveStream => (
                "The camera or microphone is not active.".to_string(),
                "Enable the device and start the recording again.".to_string(),
            ),
            CaptureError::AlreadyRecording => (
                "A recording is already in progress.".to_string(),
                "Stop the current recording before starting a new one.".to_string(),
            ),
            CaptureError::ServiceFailure(detail) => (
                detail.clone(),
                "Check your connection and API key, then try again.".to_string(),
            ),
            CaptureError::Unknown(detail) => (
                format!("Something went wrong: {}", detail),
                "Try again. If it keeps failing, restart the application.".to_string(),
            ),
        };

        Self {
            status: Status::Error,
            message: Some(message),
            hint: Some(hint),
            permission_related: error.is_permission_related(),
        }
    }
}
