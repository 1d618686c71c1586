//! Capture kind and the device constraints it implies

use std::fmt;

/// What a controller captures. Fixed for the lifetime of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    AudioOnly,
    AudioVideo,
}

impl CaptureKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AudioOnly => "audio",
            Self::AudioVideo => "audio-video",
        }
    }

    pub const fn has_video(&self) -> bool {
        matches!(self, Self::AudioVideo)
    }

    /// Constraints requested from the device backend for this kind
    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            audio: AudioConstraints::speech(),
            video: self.has_video().then(VideoConstraints::front_camera_hd),
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audio processing requested from the microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl AudioConstraints {
    pub const fn speech() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Which camera the backend should prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Camera constraints. Width and height are ideals, the aspect ratio is exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoConstraints {
    pub facing_mode: FacingMode,
    pub aspect_ratio: f64,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl VideoConstraints {
    pub const fn front_camera_hd() -> Self {
        Self {
            facing_mode: FacingMode::User,
            aspect_ratio: 16.0 / 9.0,
            ideal_width: 1920,
            ideal_height: 1080,
        }
    }
}

/// Full constraint set handed to `MediaDevices::open`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaConstraints {
    pub audio: AudioConstraints,
    pub video: Option<VideoConstraints>,
}
