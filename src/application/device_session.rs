//! Permission and device session management
//!
//! Owns the single `DeviceStream` of a capture controller and the last known
//! `PermissionState`. The stream is created on the first successful
//! acquisition, reused by later ones and released on `release()` or drop.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ports::{DeviceStream, MediaDevices};
use crate::domain::capture::{CaptureKind, PermissionState};
use crate::domain::error::CaptureError;

pub struct DeviceSessionManager<D: MediaDevices> {
    devices: D,
    stream: StdMutex<Option<DeviceStream>>,
    /// Serializes acquisitions so two callers never open hardware twice
    acquiring: Mutex<()>,
    permission: Arc<watch::Sender<PermissionState>>,
    permission_task: StdMutex<Option<JoinHandle<()>>>,
}

impl<D: MediaDevices> DeviceSessionManager<D> {
    pub fn new(devices: D) -> Self {
        let (permission, _) = watch::channel(PermissionState::Unknown);
        Self {
            devices,
            stream: StdMutex::new(None),
            acquiring: Mutex::new(()),
            permission: Arc::new(permission),
            permission_task: StdMutex::new(None),
        }
    }

    pub fn permission(&self) -> PermissionState {
        *self.permission.borrow()
    }

    pub fn subscribe_permission(&self) -> watch::Receiver<PermissionState> {
        self.permission.subscribe()
    }

    /// The live stream, if one is held
    pub fn current_stream(&self) -> Option<DeviceStream> {
        self.lock_stream().as_ref().filter(|s| s.is_live()).cloned()
    }

    pub fn has_stream(&self) -> bool {
        self.current_stream().is_some()
    }

    /// Read the backend's permission state, if it has one, and follow its
    /// changes. Never blocks and never fails; without a permission query the
    /// state stays `Unknown`.
    pub fn query_existing_permission(&self, kind: CaptureKind) {
        let Some(mut rx) = self.devices.permission_watch(kind) else {
            debug!(%kind, "permission query unavailable");
            return;
        };

        let initial = *rx.borrow_and_update();
        self.permission.send_replace(initial);
        debug!(%kind, permission = %initial, "existing permission");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let permission = Arc::clone(&self.permission);
        let task = runtime.spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                info!(permission = %state, "permission changed");
                permission.send_replace(state);
            }
        });

        let previous = self
            .permission_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Acquire the capture hardware for `kind`.
    ///
    /// Returns the held stream unchanged when one of the same kind is live.
    /// A live stream of another kind is released first.
    pub async fn acquire(&self, kind: CaptureKind) -> Result<DeviceStream, CaptureError> {
        let _guard = self.acquiring.lock().await;

        if let Some(existing) = self.current_stream() {
            if existing.kind() == kind {
                debug!(stream = existing.id(), "reusing device stream");
                return Ok(existing);
            }
            self.release();
        }

        let constraints = kind.constraints();
        match self.devices.open(&constraints).await {
            Ok(tracks) if tracks.is_empty() => {
                warn!(%kind, "device backend returned no tracks");
                Err(CaptureError::DeviceNotFound)
            }
            Ok(tracks) => {
                let stream = DeviceStream::new(kind, tracks);
                info!(stream = stream.id(), %kind, tracks = stream.tracks().len(), "device stream acquired");
                *self.lock_stream() = Some(stream.clone());
                self.permission.send_replace(PermissionState::Granted);
                Ok(stream)
            }
            Err(failure) => {
                let error = failure.classify();
                warn!(%kind, failure = %failure, error = %error, "device acquisition failed");
                if error == CaptureError::PermissionDenied {
                    self.permission.send_replace(PermissionState::Denied);
                }
                Err(error)
            }
        }
    }

    /// Stop all tracks and forget the stream. No-op when nothing is held.
    pub fn release(&self) {
        let Some(stream) = self.lock_stream().take() else {
            return;
        };
        if stream.stop() {
            info!(stream = stream.id(), "device stream released");
        }
    }

    fn lock_stream(&self) -> std::sync::MutexGuard<'_, Option<DeviceStream>> {
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<D: MediaDevices> Drop for DeviceSessionManager<D> {
    fn drop(&mut self) {
        self.release();
        if let Some(task) = self
            .permission_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{DeviceFailure, MediaTrack, TrackKind};
    use crate::domain::capture::MediaConstraints;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTrack {
        kind: TrackKind,
        stops: Arc<AtomicUsize>,
    }

    impl MediaTrack for MockTrack {
        fn kind(&self) -> TrackKind {
            self.kind
        }

        fn label(&self) -> String {
            "mock".to_string()
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockDevices {
        opens: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        failure: Option<DeviceFailure>,
        permission: Option<watch::Receiver<PermissionState>>,
    }

    impl MockDevices {
        fn working() -> Self {
            Self {
                opens: Arc::new(AtomicUsize::new(0)),
                stops: Arc::new(AtomicUsize::new(0)),
                failure: None,
                permission: None,
            }
        }

        fn failing(failure: DeviceFailure) -> Self {
            Self {
                failure: Some(failure),
                ..Self::working()
            }
        }
    }

    #[async_trait]
    impl MediaDevices for MockDevices {
        async fn open(
            &self,
            constraints: &MediaConstraints,
        ) -> Result<Vec<Box<dyn MediaTrack>>, DeviceFailure> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            let mut tracks: Vec<Box<dyn MediaTrack>> = vec![Box::new(MockTrack {
                kind: TrackKind::Audio,
                stops: Arc::clone(&self.stops),
            })];
            if constraints.video.is_some() {
                tracks.push(Box::new(MockTrack {
                    kind: TrackKind::Video,
                    stops: Arc::clone(&self.stops),
                }));
            }
            Ok(tracks)
        }

        fn permission_watch(&self, _kind: CaptureKind) -> Option<watch::Receiver<PermissionState>> {
            self.permission.clone()
        }
    }

    #[tokio::test]
    async fn acquire_twice_returns_same_stream() {
        let devices = MockDevices::working();
        let opens = Arc::clone(&devices.opens);
        let manager = DeviceSessionManager::new(devices);

        let first = manager.acquire(CaptureKind::AudioOnly).await.unwrap();
        let second = manager.acquire(CaptureKind::AudioOnly).await.unwrap();

        assert!(first.same_as(&second));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(manager.permission(), PermissionState::Granted);
    }

    #[tokio::test]
    async fn release_stops_tracks_once_and_allows_reacquire() {
        let devices = MockDevices::working();
        let stops = Arc::clone(&devices.stops);
        let opens = Arc::clone(&devices.opens);
        let manager = DeviceSessionManager::new(devices);

        let first = manager.acquire(CaptureKind::AudioVideo).await.unwrap();
        manager.release();
        manager.release();
        assert_eq!(stops.load(Ordering::SeqCst), 2);
        assert!(!first.is_live());
        assert!(!manager.has_stream());

        let second = manager.acquire(CaptureKind::AudioVideo).await.unwrap();
        assert!(!first.same_as(&second));
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn release_without_stream_is_noop() {
        let manager = DeviceSessionManager::new(MockDevices::working());
        manager.release();
        assert!(!manager.has_stream());
    }

    #[tokio::test]
    async fn drop_releases_stream() {
        let devices = MockDevices::working();
        let stops = Arc::clone(&devices.stops);
        let manager = DeviceSessionManager::new(devices);
        manager.acquire(CaptureKind::AudioOnly).await.unwrap();
        drop(manager);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_kind_replaces_stream() {
        let devices = MockDevices::working();
        let stops = Arc::clone(&devices.stops);
        let manager = DeviceSessionManager::new(devices);

        let audio = manager.acquire(CaptureKind::AudioOnly).await.unwrap();
        let video = manager.acquire(CaptureKind::AudioVideo).await.unwrap();
        assert!(!audio.same_as(&video));
        assert!(!audio.is_live());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(video.video_tracks().count(), 1);
    }

    #[tokio::test]
    async fn permission_denied_sets_denied_state() {
        let manager =
            DeviceSessionManager::new(MockDevices::failing(DeviceFailure::not_allowed("no")));
        let err = manager.acquire(CaptureKind::AudioVideo).await.unwrap_err();
        assert_eq!(err, CaptureError::PermissionDenied);
        assert_eq!(manager.permission(), PermissionState::Denied);
        assert!(!manager.has_stream());
    }

    #[tokio::test]
    async fn other_failures_leave_permission_untouched() {
        let manager =
            DeviceSessionManager::new(MockDevices::failing(DeviceFailure::not_found("none")));
        let err = manager.acquire(CaptureKind::AudioOnly).await.unwrap_err();
        assert_eq!(err, CaptureError::DeviceNotFound);
        assert_eq!(manager.permission(), PermissionState::Unknown);
    }

    #[tokio::test]
    async fn query_without_backend_support_stays_unknown() {
        let manager = DeviceSessionManager::new(MockDevices::working());
        manager.query_existing_permission(CaptureKind::AudioOnly);
        assert_eq!(manager.permission(), PermissionState::Unknown);
    }

    #[tokio::test]
    async fn query_follows_permission_changes() {
        let (tx, rx) = watch::channel(PermissionState::Prompt);
        let devices = MockDevices {
            permission: Some(rx),
            ..MockDevices::working()
        };
        let manager = DeviceSessionManager::new(devices);
        let mut observed = manager.subscribe_permission();

        manager.query_existing_permission(CaptureKind::AudioOnly);
        assert_eq!(manager.permission(), PermissionState::Prompt);

        tx.send(PermissionState::Denied).unwrap();
        observed
            .wait_for(|state| *state == PermissionState::Denied)
            .await
            .unwrap();
        assert_eq!(manager.permission(), PermissionState::Denied);
    }
}
