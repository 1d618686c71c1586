//! Capture domain module

mod artifact;
mod codec;
mod kind;
mod permission;
mod session;

pub use artifact::{suggested_filename, Artifact};
pub use codec::{
    CodecChoice, Container, AUDIO_CODEC_PREFERENCES, AUDIO_FALLBACK_CODEC,
    VIDEO_CODEC_PREFERENCES,
};
pub use kind::{
    AudioConstraints, CaptureKind, FacingMode, MediaConstraints, VideoConstraints,
};
pub use permission::PermissionState;
pub use session::{CaptureSession, CaptureStatus, InvalidStateTransition};
