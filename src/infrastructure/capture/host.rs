//! Device routing for the host machine
//!
//! Microphone-only capture goes through cpal and is encoded in-process.
//! Anything with a camera is handed to ffmpeg, which records both tracks.

use async_trait::async_trait;

use super::cpal_devices::CpalDevices;
use super::cpal_recorder::CpalRecorderFactory;
use super::ffmpeg_camera::{FfmpegCamera, FfmpegRecorderFactory};
use crate::application::ports::{
    DeviceFailure, DeviceStream, MediaDevices, MediaRecorder, MediaTrack, RecorderError,
    RecorderFactory, StaticCapabilities,
};
use crate::domain::capture::{CaptureKind, MediaConstraints};

#[derive(Debug, Clone, Default)]
pub struct HostDevices {
    microphone: CpalDevices,
    camera: FfmpegCamera,
}

impl HostDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(mut self, camera: FfmpegCamera) -> Self {
        self.camera = camera;
        self
    }

    /// Formats recordable for `kind`. Only video capture runs ffmpeg.
    pub async fn capabilities(&self, kind: CaptureKind) -> StaticCapabilities {
        let microphone = CpalDevices::capabilities();
        match kind {
            CaptureKind::AudioOnly => microphone,
            CaptureKind::AudioVideo => microphone.union(self.camera.capabilities().await),
        }
    }
}

#[async_trait]
impl MediaDevices for HostDevices {
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, DeviceFailure> {
        if constraints.video.is_some() {
            self.camera.open(constraints).await
        } else {
            self.microphone.open(constraints).await
        }
    }
}

/// Picks the recorder that matches how the stream was opened
#[derive(Debug, Clone, Default)]
pub struct HostRecorders {
    microphone: CpalRecorderFactory,
    camera: FfmpegRecorderFactory,
}

impl HostRecorders {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecorderFactory for HostRecorders {
    fn create(
        &self,
        stream: &DeviceStream,
        mime_type: &str,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        if stream.kind().has_video() {
            self.camera.create(stream, mime_type)
        } else {
            self.microphone.create(stream, mime_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CapabilityOracle, TrackKind};
    use crate::infrastructure::capture::{FfmpegInput, MicrophoneTrack, OGG_OPUS_MIME};

    #[tokio::test]
    async fn audio_capabilities_skip_ffmpeg() {
        let devices =
            HostDevices::new().with_camera(FfmpegCamera::new().with_program("/nonexistent"));
        let caps = devices.capabilities(CaptureKind::AudioOnly).await;
        assert!(caps.is_type_supported(OGG_OPUS_MIME));
        assert!(!caps.is_type_supported("video/webm"));

        let caps = devices.capabilities(CaptureKind::AudioVideo).await;
        assert!(caps.is_type_supported(OGG_OPUS_MIME));
        assert!(!caps.is_type_supported("video/webm"));
    }

    #[tokio::test]
    async fn camera_requests_go_to_ffmpeg() {
        let devices =
            HostDevices::new().with_camera(FfmpegCamera::new().with_program("/nonexistent"));
        let failure = devices
            .open(&CaptureKind::AudioVideo.constraints())
            .await
            .err()
            .unwrap();
        assert!(failure.message.contains("ffmpeg"));
    }

    #[test]
    fn recorders_follow_stream_kind() {
        let recorders = HostRecorders::new();
        let mic = DeviceStream::new(
            CaptureKind::AudioOnly,
            vec![Box::new(MicrophoneTrack::new("Built-in"))],
        );
        let camera = DeviceStream::new(
            CaptureKind::AudioVideo,
            vec![
                Box::new(FfmpegInput::new(TrackKind::Video, "/dev/video0")),
                Box::new(FfmpegInput::new(TrackKind::Audio, "default")),
            ],
        );

        assert!(recorders.create(&mic, OGG_OPUS_MIME).is_ok());
        assert!(recorders.create(&mic, "video/webm").is_err());
        assert!(recorders.create(&camera, "video/webm").is_ok());
        assert!(recorders.create(&camera, OGG_OPUS_MIME).is_err());
    }
}
