//! Capture device adapters
//!
//! Microphone capture through cpal, encoded as a streaming Ogg/Opus
//! container, and camera capture through an ffmpeg child process.

mod cpal_devices;
mod cpal_recorder;
mod ffmpeg_camera;
mod host;
mod ogg_opus;
mod resample;

pub use cpal_devices::{CpalDevices, MicrophoneTrack};
pub use cpal_recorder::CpalRecorderFactory;
pub use ffmpeg_camera::{FfmpegCamera, FfmpegInput, FfmpegRecorderFactory};
pub use host::{HostDevices, HostRecorders};
pub use ogg_opus::{EncodingError, OggOpusStream, OGG_OPUS_MIME};
