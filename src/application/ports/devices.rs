//! Capture device port interfaces

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::capture::{CaptureKind, MediaConstraints, PermissionState};
use crate::domain::error::CaptureError;

/// Failure names reported by device backends
pub mod failure_names {
    pub const NOT_ALLOWED: &str = "NotAllowedError";
    pub const PERMISSION_DENIED: &str = "PermissionDeniedError";
    pub const NOT_FOUND: &str = "NotFoundError";
    pub const DEVICES_NOT_FOUND: &str = "DevicesNotFoundError";
    pub const OVERCONSTRAINED: &str = "OverconstrainedError";
    pub const SECURITY: &str = "SecurityError";
    pub const NOT_SUPPORTED: &str = "NotSupportedError";
    pub const TYPE_ERROR: &str = "TypeError";
    pub const ABORT: &str = "AbortError";
    pub const NOT_READABLE: &str = "NotReadableError";
}

/// Raw failure from a device backend, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct DeviceFailure {
    pub name: String,
    pub message: String,
}

impl DeviceFailure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(failure_names::NOT_ALLOWED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(failure_names::NOT_FOUND, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(failure_names::NOT_SUPPORTED, message)
    }

    /// Map the backend failure into the capture error taxonomy
    pub fn classify(&self) -> CaptureError {
        use failure_names::*;

        match self.name.as_str() {
            NOT_ALLOWED | PERMISSION_DENIED => CaptureError::PermissionDenied,
            NOT_FOUND | DEVICES_NOT_FOUND | OVERCONSTRAINED => CaptureError::DeviceNotFound,
            SECURITY => CaptureError::InsecureContext,
            NOT_SUPPORTED | TYPE_ERROR => {
                CaptureError::UnsupportedCapability(self.message.clone())
            }
            _ => CaptureError::Unknown(self.to_string()),
        }
    }
}

/// Kind of a hardware track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One live hardware track (a microphone or a camera)
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Human-readable device label
    fn label(&self) -> String;

    /// Stop the track and free the hardware
    fn stop(&self);
}

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

struct StreamInner {
    id: u64,
    kind: CaptureKind,
    tracks: Vec<Box<dyn MediaTrack>>,
    stopped: AtomicBool,
}

/// Handle to the acquired tracks.
///
/// Clones share the same tracks; equality is identity. Tracks are stopped at
/// most once no matter how many clones call `stop`.
#[derive(Clone)]
pub struct DeviceStream {
    inner: Arc<StreamInner>,
}

impl DeviceStream {
    pub fn new(kind: CaptureKind, tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
                kind,
                tracks,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> CaptureKind {
        self.inner.kind
    }

    pub fn tracks(&self) -> &[Box<dyn MediaTrack>] {
        &self.inner.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &(dyn MediaTrack + 'static)> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &(dyn MediaTrack + 'static)> {
        self.tracks_of(TrackKind::Video)
    }

    pub fn is_live(&self) -> bool {
        !self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Same underlying acquisition
    pub fn same_as(&self, other: &DeviceStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stop every track. Returns false if the stream was already stopped.
    pub fn stop(&self) -> bool {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        for track in &self.inner.tracks {
            track.stop();
        }
        true
    }

    fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &(dyn MediaTrack + 'static)> {
        self.inner
            .tracks
            .iter()
            .filter(move |t| t.kind() == kind)
            .map(|t| t.as_ref())
    }
}

impl PartialEq for DeviceStream {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for DeviceStream {}

impl fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceStream")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("tracks", &self.inner.tracks.len())
            .field("live", &self.is_live())
            .finish()
    }
}

/// Port for acquiring capture hardware
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open tracks matching the constraints.
    ///
    /// Backends without any capture API return a `NotSupportedError` failure.
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, DeviceFailure>;

    /// Current permission state and its future changes, when the backend can
    /// report them. `None` means the runtime has no permission query.
    fn permission_watch(&self, _kind: CaptureKind) -> Option<watch::Receiver<PermissionState>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingTrack {
        kind: TrackKind,
        stops: Arc<AtomicUsize>,
    }

    impl MediaTrack for CountingTrack {
        fn kind(&self) -> TrackKind {
            self.kind
        }

        fn label(&self) -> String {
            "test".to_string()
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stream_with(stops: &Arc<AtomicUsize>) -> DeviceStream {
        DeviceStream::new(
            CaptureKind::AudioVideo,
            vec![
                Box::new(CountingTrack {
                    kind: TrackKind::Audio,
                    stops: Arc::clone(stops),
                }),
                Box::new(CountingTrack {
                    kind: TrackKind::Video,
                    stops: Arc::clone(stops),
                }),
            ],
        )
    }

    #[test]
    fn classify_known_failures() {
        assert_eq!(
            DeviceFailure::not_allowed("no").classify(),
            CaptureError::PermissionDenied
        );
        assert_eq!(
            DeviceFailure::new(failure_names::PERMISSION_DENIED, "").classify(),
            CaptureError::PermissionDenied
        );
        assert_eq!(
            DeviceFailure::not_found("none").classify(),
            CaptureError::DeviceNotFound
        );
        assert_eq!(
            DeviceFailure::new(failure_names::OVERCONSTRAINED, "").classify(),
            CaptureError::DeviceNotFound
        );
        assert_eq!(
            DeviceFailure::new(failure_names::SECURITY, "").classify(),
            CaptureError::InsecureContext
        );
        assert_eq!(
            DeviceFailure::not_supported("no camera api").classify(),
            CaptureError::UnsupportedCapability("no camera api".to_string())
        );
    }

    #[test]
    fn classify_unknown_failure_keeps_detail() {
        let err = DeviceFailure::new(failure_names::NOT_READABLE, "busy").classify();
        assert_eq!(
            err,
            CaptureError::Unknown("NotReadableError: busy".to_string())
        );
    }

    #[test]
    fn stop_stops_tracks_exactly_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let stream = stream_with(&stops);
        let clone = stream.clone();

        assert!(stream.stop());
        assert!(!clone.stop());
        assert_eq!(stops.load(Ordering::SeqCst), 2);
        assert!(!stream.is_live());
    }

    #[test]
    fn equality_is_identity() {
        let stops = Arc::new(AtomicUsize::new(0));
        let a = stream_with(&stops);
        let b = stream_with(&stops);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn tracks_split_by_kind() {
        let stops = Arc::new(AtomicUsize::new(0));
        let stream = stream_with(&stops);
        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.video_tracks().count(), 1);
        assert_eq!(stream.kind(), CaptureKind::AudioVideo);
    }
}
