//! Codec choice value object

use std::fmt;

/// Audio formats in order of preference
pub const AUDIO_CODEC_PREFERENCES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/mp4",
    "audio/ogg;codecs=opus",
    "audio/wav",
];

/// Video formats in order of preference
pub const VIDEO_CODEC_PREFERENCES: &[&str] = &[
    "video/mp4;codecs=avc1,mp4a",
    "video/mp4",
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Used for audio when the runtime reports none of the preferences
pub const AUDIO_FALLBACK_CODEC: &str = "audio/webm";

/// Container format of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Mp4,
    Webm,
    Ogg,
    Wav,
}

impl Container {
    /// Canonical file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::Wav => "wav",
        }
    }

    /// Derive the container from a mime type such as `video/mp4;codecs=avc1`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        let subtype = essence.split('/').nth(1)?;

        match subtype.to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "webm" => Some(Self::Webm),
            "ogg" => Some(Self::Ogg),
            "wav" | "x-wav" | "wave" => Some(Self::Wav),
            _ => None,
        }
    }
}

/// Result of codec negotiation.
///
/// `Unsupported` is the sentinel for video capture with no usable format;
/// starting a session with it is a hard error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodecChoice {
    Supported(String),
    Unsupported,
}

impl CodecChoice {
    pub fn supported(mime: impl Into<String>) -> Self {
        Self::Supported(mime.into())
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }

    /// Full mime type including codec parameters
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Supported(mime) => Some(mime),
            Self::Unsupported => None,
        }
    }

    /// Mime type without codec parameters (`video/webm;codecs=vp9` -> `video/webm`)
    pub fn essence(&self) -> Option<&str> {
        self.mime_type()
            .and_then(|mime| mime.split(';').next())
            .map(str::trim)
    }

    pub fn container(&self) -> Option<Container> {
        self.mime_type().and_then(Container::from_mime)
    }

    /// Extension for the suggested download filename.
    /// Anything that is not mp4 is saved as webm, matching what recorders emit.
    pub fn extension(&self) -> &'static str {
        match self.container() {
            Some(container) => container.extension(),
            None => Container::Webm.extension(),
        }
    }
}

impl fmt::Display for CodecChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supported(mime) => write!(f, "{}", mime),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}
