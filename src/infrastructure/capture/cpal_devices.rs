//! Microphone access through cpal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, info};

use super::ogg_opus::OGG_OPUS_MIME;
use crate::application::ports::{
    DeviceFailure, MediaDevices, MediaTrack, StaticCapabilities, TrackKind,
};
use crate::domain::capture::MediaConstraints;

/// Default input device of the cpal host.
///
/// Cameras are not reachable through cpal, so video requests fail with
/// `NotSupportedError`; `HostDevices` routes them to ffmpeg instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDevices;

impl CpalDevices {
    pub fn new() -> Self {
        Self
    }

    /// What the cpal recorder can produce
    pub fn capabilities() -> StaticCapabilities {
        StaticCapabilities::new([OGG_OPUS_MIME])
    }
}

#[async_trait]
impl MediaDevices for CpalDevices {
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, DeviceFailure> {
        if constraints.video.is_some() {
            return Err(DeviceFailure::not_supported(
                "camera capture is not available on this host",
            ));
        }

        // Device enumeration can block on some hosts
        let label = tokio::task::spawn_blocking(|| {
            let host = cpal::default_host();
            debug!(host = ?host.id(), "opening default input device");
            let device = host
                .default_input_device()
                .ok_or_else(|| DeviceFailure::not_found("no microphone found"))?;
            device
                .default_input_config()
                .map_err(|e| DeviceFailure::new("NotReadableError", e.to_string()))?;
            Ok::<_, DeviceFailure>(device.name().unwrap_or_else(|_| "microphone".to_string()))
        })
        .await
        .map_err(|e| DeviceFailure::new("AbortError", e.to_string()))??;

        info!(device = %label, "microphone opened");
        Ok(vec![Box::new(MicrophoneTrack::new(label))])
    }
}

/// Claim on the default microphone. The cpal stream itself lives on the
/// recorder thread; stopping the track ends any recording bound to it.
pub struct MicrophoneTrack {
    label: String,
    live: Arc<AtomicBool>,
}

impl MicrophoneTrack {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl MediaTrack for MicrophoneTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!(device = %self.label, "microphone track stopped");
        }
    }
}
