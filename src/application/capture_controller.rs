//! Capture session controller
//!
//! Drives one recording lifecycle at a time: acquires the stream through the
//! device session manager, negotiates a codec, pumps recorder chunks into the
//! `CaptureSession` in arrival order and hands out the finalized artifact.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::device_session::DeviceSessionManager;
use super::negotiator::negotiate;
use super::ports::{
    ArtifactRef, ArtifactStore, CapabilityOracle, Clock, DeviceStream, MediaDevices,
    MediaRecorder, RecorderEvent, RecorderFactory,
};
use super::scroll_engine::ScrollSync;
use super::status::StatusBroadcaster;
use crate::domain::capture::{
    suggested_filename, Artifact, CaptureKind, CaptureSession, CaptureStatus, CodecChoice,
};
use crate::domain::config::DEFAULT_PURPOSE;
use crate::domain::error::CaptureError;
use crate::domain::status::Status;

/// Fixed settings of one controller
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub kind: CaptureKind,
    /// First filename segment
    pub purpose: String,
    /// Second filename segment
    pub context: String,
    /// Acquire the device on `start()` when no stream is held
    pub auto_acquire: bool,
}

impl CaptureConfig {
    pub fn new(kind: CaptureKind) -> Self {
        let context = match kind {
            CaptureKind::AudioOnly => "audio",
            CaptureKind::AudioVideo => "video",
        };
        Self {
            kind,
            purpose: DEFAULT_PURPOSE.to_string(),
            context: context.to_string(),
            auto_acquire: true,
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    pub fn with_auto_acquire(mut self, auto_acquire: bool) -> Self {
        self.auto_acquire = auto_acquire;
        self
    }
}

/// How a finalized artifact is handed to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Audio for the transcription service
    Base64(String),
    /// Stored take, reusable for playback or download
    Download {
        reference: ArtifactRef,
        filename: String,
    },
}

/// Result of a successful `stop()`
#[derive(Debug, Clone)]
pub struct FinalizedCapture {
    pub artifact: Artifact,
    pub delivery: Delivery,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone)]
struct StoredArtifact {
    reference: ArtifactRef,
    filename: String,
}

/// Everything that lives exactly as long as one Recording/Finalizing cycle
struct ActiveRecording {
    recorder: Box<dyn MediaRecorder>,
    finished: oneshot::Receiver<Result<(), String>>,
    pump: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

pub struct CaptureController<D, F, S>
where
    D: MediaDevices,
    F: RecorderFactory,
    S: ArtifactStore,
{
    config: CaptureConfig,
    devices: Arc<DeviceSessionManager<D>>,
    oracle: Arc<dyn CapabilityOracle>,
    recorders: F,
    store: S,
    clock: Arc<dyn Clock>,
    scroll: Option<Arc<dyn ScrollSync>>,
    status: Option<StatusBroadcaster>,
    session: Arc<StdMutex<CaptureSession>>,
    /// Serializes start/stop
    active: Mutex<Option<ActiveRecording>>,
    /// Codec negotiated for the stream with the given id
    negotiated: StdMutex<Option<(u64, CodecChoice)>>,
    artifact: StdMutex<Option<StoredArtifact>>,
}

impl<D, F, S> CaptureController<D, F, S>
where
    D: MediaDevices,
    F: RecorderFactory,
    S: ArtifactStore,
{
    pub fn new(
        config: CaptureConfig,
        devices: Arc<DeviceSessionManager<D>>,
        oracle: Arc<dyn CapabilityOracle>,
        recorders: F,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            devices,
            oracle,
            recorders,
            store,
            clock,
            scroll: None,
            status: None,
            session: Arc::new(StdMutex::new(CaptureSession::new())),
            active: Mutex::new(None),
            negotiated: StdMutex::new(None),
            artifact: StdMutex::new(None),
        }
    }

    /// Drive a prompter from recording start/stop
    pub fn with_scroll(mut self, scroll: Arc<dyn ScrollSync>) -> Self {
        self.scroll = Some(scroll);
        self
    }

    /// Publish lifecycle statuses and failures
    pub fn with_status(mut self, status: StatusBroadcaster) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> CaptureKind {
        self.config.kind
    }

    pub fn devices(&self) -> &Arc<DeviceSessionManager<D>> {
        &self.devices
    }

    pub fn status(&self) -> CaptureStatus {
        self.lock_session().status()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.lock_session().elapsed_secs()
    }

    /// Codec of the most recently negotiated stream
    pub fn codec(&self) -> Option<CodecChoice> {
        self.lock_negotiated().as_ref().map(|(_, codec)| codec.clone())
    }

    /// Reference to the currently held take, if any
    pub fn current_artifact(&self) -> Option<ArtifactRef> {
        self.lock_artifact().as_ref().map(|held| held.reference.clone())
    }

    /// Suggested filename of the currently held take, if any
    pub fn current_filename(&self) -> Option<String> {
        self.lock_artifact().as_ref().map(|held| held.filename.clone())
    }

    /// Begin recording.
    ///
    /// Rejected with `AlreadyRecording` while a session is recording or
    /// finalizing. Other failures are also published on the status channel.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let mut active = self.active.lock().await;
        if active.is_some() || !self.lock_session().is_idle() {
            debug!("start rejected, session already live");
            return Err(CaptureError::AlreadyRecording);
        }

        match self.open_recording().await {
            Ok(recording) => {
                *active = Some(recording);
                Ok(())
            }
            Err(error) => {
                self.raise(&error);
                Err(error)
            }
        }
    }

    /// Finish the current recording.
    ///
    /// Returns `Ok(None)` unless recording. Otherwise waits for the recorder to
    /// flush and returns the finalized capture.
    pub async fn stop(&self) -> Result<Option<FinalizedCapture>, CaptureError> {
        let active = {
            let mut guard = self.active.lock().await;
            {
                let mut session = self.lock_session();
                if !session.is_recording() {
                    debug!(status = %session.status(), "stop ignored");
                    return Ok(None);
                }
                if let Err(e) = session.request_stop() {
                    return Err(CaptureError::Unknown(e.to_string()));
                }
            }
            guard.take()
        };

        let Some(mut active) = active else {
            self.lock_session().abandon();
            return Ok(None);
        };

        active.ticker.abort();
        if let Some(scroll) = &self.scroll {
            scroll.pause();
        }
        self.set_status(Status::Finalizing);
        info!(elapsed_secs = self.elapsed_secs(), "stopping recording");

        active.recorder.request_stop();
        let outcome = match (&mut active.finished).await {
            Ok(outcome) => outcome,
            Err(_) => Err("recorder closed without acknowledging stop".to_string()),
        };
        if let Err(e) = active.pump.await {
            warn!(error = %e, "chunk pump ended abnormally");
        }

        let result = match outcome {
            Ok(()) => self.finalize().await,
            Err(detail) => {
                self.lock_session().abandon();
                Err(CaptureError::Unknown(detail))
            }
        };

        match result {
            Ok(capture) => {
                self.set_status(Status::Idle);
                Ok(Some(capture))
            }
            Err(error) => {
                self.raise(&error);
                Err(error)
            }
        }
    }

    /// Release the held take. Only allowed while idle.
    pub async fn discard_artifact(&self) -> Result<bool, CaptureError> {
        if !self.lock_session().is_idle() {
            return Err(CaptureError::AlreadyRecording);
        }
        let Some(held) = self.lock_artifact().take() else {
            return Ok(false);
        };
        self.store.revoke(&held.reference).await;
        info!(artifact = %held.reference, "artifact discarded");
        Ok(true)
    }

    async fn open_recording(&self) -> Result<ActiveRecording, CaptureError> {
        let stream = match self.devices.current_stream() {
            Some(stream) => stream,
            None if self.config.auto_acquire => self.devices.acquire(self.config.kind).await?,
            None => return Err(CaptureError::NoActiveStream),
        };

        let codec = self.codec_for(&stream);
        let Some(mime_type) = codec.mime_type() else {
            return Err(CaptureError::UnsupportedCodec);
        };

        let mut recorder = self.recorders.create(&stream, mime_type)?;
        let (tx, rx) = mpsc::unbounded_channel();

        self.lock_session()
            .begin(codec.clone())
            .map_err(|_| CaptureError::AlreadyRecording)?;

        if let Err(e) = recorder.start(tx).await {
            self.lock_session().abandon();
            return Err(e.into());
        }

        let (finished_tx, finished) = oneshot::channel();
        let pump = tokio::spawn(pump_chunks(Arc::clone(&self.session), rx, finished_tx));
        let ticker = tokio::spawn(tick_elapsed(Arc::clone(&self.session)));

        if let Some(scroll) = &self.scroll {
            scroll.reset();
            scroll.run();
        }
        self.set_status(Status::Recording);
        info!(stream = stream.id(), codec = %codec, "recording started");

        Ok(ActiveRecording {
            recorder,
            finished,
            pump,
            ticker,
        })
    }

    async fn finalize(&self) -> Result<FinalizedCapture, CaptureError> {
        let (artifact, codec, elapsed_secs) = {
            let mut session = self.lock_session();
            let codec = session.codec().cloned().unwrap_or(CodecChoice::Unsupported);
            let elapsed_secs = session.elapsed_secs();
            let artifact = session
                .finalize(self.clock.unix_millis())
                .map_err(|e| CaptureError::Unknown(e.to_string()))?;
            (artifact, codec, elapsed_secs)
        };
        info!(
            size = %artifact.human_readable_size(),
            mime = artifact.mime_type(),
            elapsed_secs,
            "recording finalized"
        );

        let delivery = match self.config.kind {
            CaptureKind::AudioOnly => Delivery::Base64(artifact.to_base64()),
            CaptureKind::AudioVideo => {
                let filename = suggested_filename(
                    &self.config.purpose,
                    &self.config.context,
                    artifact.created_at_ms(),
                    codec.extension(),
                );
                let reference = self.store.publish(&artifact, &filename).await?;
                let previous = self.lock_artifact().replace(StoredArtifact {
                    reference: reference.clone(),
                    filename: filename.clone(),
                });
                // A take published under the same reference overwrote the old one
                if let Some(previous) = previous.filter(|p| p.reference != reference) {
                    debug!(artifact = %previous.reference, "releasing superseded artifact");
                    self.store.revoke(&previous.reference).await;
                }
                Delivery::Download {
                    reference,
                    filename,
                }
            }
        };

        Ok(FinalizedCapture {
            artifact,
            delivery,
            elapsed_secs,
        })
    }

    fn codec_for(&self, stream: &DeviceStream) -> CodecChoice {
        let mut negotiated = self.lock_negotiated();
        if let Some((id, codec)) = negotiated.as_ref() {
            if *id == stream.id() {
                return codec.clone();
            }
        }
        let codec = negotiate(self.config.kind, self.oracle.as_ref());
        *negotiated = Some((stream.id(), codec.clone()));
        codec
    }

    fn set_status(&self, status: Status) {
        if let Some(broadcaster) = &self.status {
            broadcaster.set(status);
        }
    }

    fn raise(&self, error: &CaptureError) {
        match &self.status {
            Some(broadcaster) => {
                broadcaster.raise(error);
            }
            None => warn!(error = %error, "capture failed"),
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, CaptureSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_negotiated(&self) -> std::sync::MutexGuard<'_, Option<(u64, CodecChoice)>> {
        self.negotiated.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_artifact(&self) -> std::sync::MutexGuard<'_, Option<StoredArtifact>> {
        self.artifact.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<D, F, S> Drop for CaptureController<D, F, S>
where
    D: MediaDevices,
    F: RecorderFactory,
    S: ArtifactStore,
{
    fn drop(&mut self) {
        if let Some(mut active) = self.active.get_mut().take() {
            active.recorder.request_stop();
            active.ticker.abort();
            active.pump.abort();
        }
    }
}

/// Append recorder chunks to the session in the order they arrive and report
/// how the recorder finished.
async fn pump_chunks(
    session: Arc<StdMutex<CaptureSession>>,
    mut events: mpsc::UnboundedReceiver<RecorderEvent>,
    finished: oneshot::Sender<Result<(), String>>,
) {
    let outcome = loop {
        match events.recv().await {
            Some(RecorderEvent::Data(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                let mut session = session.lock().unwrap_or_else(|e| e.into_inner());
                if !session.push_chunk(chunk) {
                    debug!("chunk dropped, no live session");
                }
            }
            Some(RecorderEvent::Stopped) => break Ok(()),
            Some(RecorderEvent::Failed(detail)) => {
                warn!(error = %detail, "recorder failed");
                break Err(detail);
            }
            None => break Err("recorder event channel closed".to_string()),
        }
    };
    let _ = finished.send(outcome);
}

/// Count whole seconds while the session is recording
async fn tick_elapsed(session: Arc<StdMutex<CaptureSession>>) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(1));
    // First tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        let mut session = session.lock().unwrap_or_else(|e| e.into_inner());
        if !session.is_recording() {
            break;
        }
        session.tick_second();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        DeviceFailure, ManualClock, MediaTrack, RecorderError, RecorderEvents, StaticCapabilities,
        StoreError, TrackKind,
    };
    use crate::application::scroll_engine::SharedScroll;
    use crate::domain::capture::MediaConstraints;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTrack;

    impl MediaTrack for MockTrack {
        fn kind(&self) -> TrackKind {
            TrackKind::Audio
        }

        fn label(&self) -> String {
            "mock".to_string()
        }

        fn stop(&self) {}
    }

    #[derive(Default)]
    struct MockDevices {
        opens: Arc<AtomicUsize>,
        denied: bool,
    }

    #[async_trait]
    impl MediaDevices for MockDevices {
        async fn open(
            &self,
            _constraints: &MediaConstraints,
        ) -> Result<Vec<Box<dyn MediaTrack>>, DeviceFailure> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.denied {
                return Err(DeviceFailure::not_allowed("Permission denied"));
            }
            Ok(vec![Box::new(MockTrack)])
        }
    }

    /// Shared view into whichever recorder the factory created last
    #[derive(Clone, Default)]
    struct RecorderHandle {
        events: Arc<StdMutex<Option<RecorderEvents>>>,
        fail_on_stop: Arc<StdMutex<Option<String>>>,
        trailing: Arc<StdMutex<Option<Vec<u8>>>>,
        created: Arc<AtomicUsize>,
    }

    impl RecorderHandle {
        fn emit(&self, chunk: &[u8]) {
            if let Some(tx) = self.events.lock().unwrap().as_ref() {
                tx.send(RecorderEvent::Data(chunk.to_vec())).unwrap();
            }
        }
    }

    struct MockRecorder {
        handle: RecorderHandle,
    }

    #[async_trait]
    impl MediaRecorder for MockRecorder {
        async fn start(&mut self, events: RecorderEvents) -> Result<(), RecorderError> {
            *self.handle.events.lock().unwrap() = Some(events);
            Ok(())
        }

        fn request_stop(&mut self) {
            if let Some(tx) = self.handle.events.lock().unwrap().take() {
                if let Some(tail) = self.handle.trailing.lock().unwrap().take() {
                    let _ = tx.send(RecorderEvent::Data(tail));
                }
                let event = match self.handle.fail_on_stop.lock().unwrap().take() {
                    Some(detail) => RecorderEvent::Failed(detail),
                    None => RecorderEvent::Stopped,
                };
                let _ = tx.send(event);
            }
        }
    }

    struct MockFactory {
        handle: RecorderHandle,
    }

    impl RecorderFactory for MockFactory {
        fn create(
            &self,
            _stream: &DeviceStream,
            _mime_type: &str,
        ) -> Result<Box<dyn MediaRecorder>, RecorderError> {
            self.handle.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockRecorder {
                handle: self.handle.clone(),
            }))
        }
    }

    #[derive(Clone, Default)]
    struct MockStore {
        published: Arc<StdMutex<Vec<String>>>,
        revoked: Arc<StdMutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl ArtifactStore for MockStore {
        async fn publish(
            &self,
            _artifact: &Artifact,
            filename: &str,
        ) -> Result<ArtifactRef, StoreError> {
            if self.fail {
                return Err(StoreError::WriteFailed("disk full".into()));
            }
            self.published.lock().unwrap().push(filename.to_string());
            Ok(ArtifactRef::new(format!("mem://{filename}")))
        }

        async fn revoke(&self, reference: &ArtifactRef) {
            self.revoked.lock().unwrap().push(reference.uri().to_string());
        }
    }

    type TestController = CaptureController<MockDevices, MockFactory, MockStore>;

    struct Harness {
        controller: TestController,
        handle: RecorderHandle,
        store: MockStore,
        opens: Arc<AtomicUsize>,
        clock: Arc<ManualClock>,
    }

    fn harness(kind: CaptureKind, oracle: StaticCapabilities, devices: MockDevices) -> Harness {
        let handle = RecorderHandle::default();
        let store = MockStore::default();
        let opens = Arc::clone(&devices.opens);
        let clock = Arc::new(ManualClock::with_unix_millis(1_700_000_000_000));
        let controller = CaptureController::new(
            CaptureConfig::new(kind),
            Arc::new(DeviceSessionManager::new(devices)),
            Arc::new(oracle),
            MockFactory {
                handle: handle.clone(),
            },
            store.clone(),
            clock.clone(),
        );
        Harness {
            controller,
            handle,
            store,
            opens,
            clock,
        }
    }

    fn video_harness() -> Harness {
        harness(
            CaptureKind::AudioVideo,
            StaticCapabilities::new(["video/webm"]),
            MockDevices::default(),
        )
    }

    #[tokio::test]
    async fn start_and_stop_produces_ordered_artifact() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        assert_eq!(h.controller.status(), CaptureStatus::Recording);

        h.handle.emit(b"one-");
        h.handle.emit(b"two-");
        h.handle.emit(b"three");

        let capture = h.controller.stop().await.unwrap().unwrap();
        assert_eq!(capture.artifact.data(), b"one-two-three");
        assert_eq!(capture.artifact.mime_type(), "video/webm");
        assert_eq!(
            capture.delivery,
            Delivery::Download {
                reference: ArtifactRef::new("mem://bio-video-1700000000000.webm"),
                filename: "bio-video-1700000000000.webm".to_string(),
            }
        );
        assert_eq!(h.controller.status(), CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn data_flushed_on_stop_is_kept_last() {
        let h = video_harness();
        *h.handle.trailing.lock().unwrap() = Some(b"-tail".to_vec());
        h.controller.start().await.unwrap();
        h.handle.emit(b"head");

        let capture = h.controller.stop().await.unwrap().unwrap();
        assert_eq!(capture.artifact.data(), b"head-tail");
    }

    #[tokio::test]
    async fn audio_delivers_base64() {
        let h = harness(
            CaptureKind::AudioOnly,
            StaticCapabilities::new(["audio/wav"]),
            MockDevices::default(),
        );
        h.controller.start().await.unwrap();
        h.handle.emit(b"RIFF");
        let capture = h.controller.stop().await.unwrap().unwrap();
        assert_eq!(capture.delivery, Delivery::Base64("UklGRg==".to_string()));
        assert_eq!(capture.artifact.mime_type(), "audio/wav");
        assert!(h.store.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_before_any_chunk_yields_empty_artifact() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        let capture = h.controller.stop().await.unwrap().unwrap();
        assert!(capture.artifact.is_empty());
        assert_eq!(capture.artifact.mime_type(), "video/webm");
    }

    #[tokio::test]
    async fn stop_while_idle_is_noop() {
        let h = video_harness();
        assert!(h.controller.stop().await.unwrap().is_none());
        assert_eq!(h.controller.status(), CaptureStatus::Idle);
        assert_eq!(h.handle.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        assert_eq!(
            h.controller.start().await.unwrap_err(),
            CaptureError::AlreadyRecording
        );
        assert_eq!(h.handle.created.load(Ordering::SeqCst), 1);
        assert_eq!(h.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_stream_without_auto_acquire() {
        let handle = RecorderHandle::default();
        let controller = CaptureController::new(
            CaptureConfig::new(CaptureKind::AudioVideo).with_auto_acquire(false),
            Arc::new(DeviceSessionManager::new(MockDevices::default())),
            Arc::new(StaticCapabilities::new(["video/webm"])),
            MockFactory { handle },
            MockStore::default(),
            Arc::new(ManualClock::new()),
        );
        assert_eq!(
            controller.start().await.unwrap_err(),
            CaptureError::NoActiveStream
        );
    }

    #[tokio::test]
    async fn unsupported_codec_is_reported() {
        let status = StatusBroadcaster::new();
        let h = harness(
            CaptureKind::AudioVideo,
            StaticCapabilities::none(),
            MockDevices::default(),
        );
        let controller = h.controller.with_status(status.clone());
        assert_eq!(
            controller.start().await.unwrap_err(),
            CaptureError::UnsupportedCodec
        );
        assert_eq!(controller.codec(), Some(CodecChoice::Unsupported));
        assert_eq!(status.current().status, Status::Error);
        assert_eq!(controller.status(), CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn permission_denied_surfaces_once() {
        let status = StatusBroadcaster::new();
        let h = harness(
            CaptureKind::AudioVideo,
            StaticCapabilities::new(["video/webm"]),
            MockDevices {
                denied: true,
                ..MockDevices::default()
            },
        );
        let controller = h.controller.with_status(status.clone());
        let err = controller.start().await.unwrap_err();
        assert_eq!(err, CaptureError::PermissionDenied);
        assert!(status.current().permission_related);
        assert_eq!(
            controller.devices().permission(),
            crate::domain::capture::PermissionState::Denied
        );
    }

    #[tokio::test]
    async fn new_take_releases_previous_one() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        let first = h.controller.stop().await.unwrap().unwrap();
        h.clock.advance(StdDuration::from_secs(30));
        h.controller.start().await.unwrap();
        h.controller.stop().await.unwrap().unwrap();

        let Delivery::Download { reference, .. } = first.delivery else {
            panic!("expected a stored take");
        };
        assert_eq!(*h.store.revoked.lock().unwrap(), vec![reference.uri().to_string()]);
        assert_eq!(
            h.controller.current_filename().as_deref(),
            Some("bio-video-1700000030000.webm")
        );
        assert_eq!(h.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overwritten_take_is_not_revoked() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        h.controller.stop().await.unwrap();
        h.controller.start().await.unwrap();
        h.controller.stop().await.unwrap();

        assert_eq!(h.store.published.lock().unwrap().len(), 2);
        assert!(h.store.revoked.lock().unwrap().is_empty());
        assert!(h.controller.current_artifact().is_some());
    }

    #[tokio::test]
    async fn recorder_failure_keeps_previous_take() {
        let status = StatusBroadcaster::new();
        let h = video_harness();
        let controller = h.controller.with_status(status.clone());

        controller.start().await.unwrap();
        controller.stop().await.unwrap().unwrap();
        let kept = controller.current_artifact().unwrap();

        controller.start().await.unwrap();
        *h.handle.fail_on_stop.lock().unwrap() = Some("encoder crashed".into());
        let err = controller.stop().await.unwrap_err();

        assert_eq!(err, CaptureError::Unknown("encoder crashed".into()));
        assert_eq!(controller.current_artifact(), Some(kept));
        assert!(h.store.revoked.lock().unwrap().is_empty());
        assert_eq!(controller.status(), CaptureStatus::Idle);
        assert_eq!(status.current().status, Status::Error);
    }

    #[tokio::test]
    async fn store_failure_surfaces_unknown() {
        let controller = CaptureController::new(
            CaptureConfig::new(CaptureKind::AudioVideo),
            Arc::new(DeviceSessionManager::new(MockDevices::default())),
            Arc::new(StaticCapabilities::new(["video/mp4"])),
            MockFactory {
                handle: RecorderHandle::default(),
            },
            MockStore {
                fail: true,
                ..MockStore::default()
            },
            Arc::new(ManualClock::new()),
        );
        controller.start().await.unwrap();
        assert!(matches!(
            controller.stop().await.unwrap_err(),
            CaptureError::Unknown(_)
        ));
        assert_eq!(controller.status(), CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn discard_releases_take() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        h.controller.stop().await.unwrap();

        assert!(h.controller.discard_artifact().await.unwrap());
        assert!(h.controller.current_artifact().is_none());
        assert_eq!(h.store.revoked.lock().unwrap().len(), 1);
        assert!(!h.controller.discard_artifact().await.unwrap());
    }

    #[tokio::test]
    async fn discard_rejected_while_recording() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        assert_eq!(
            h.controller.discard_artifact().await.unwrap_err(),
            CaptureError::AlreadyRecording
        );
    }

    #[tokio::test]
    async fn scroll_follows_recording() {
        let clock = Arc::new(ManualClock::new());
        let scroll = SharedScroll::with_clock(clock.clone(), 50.0);
        scroll.manual_scroll(300.0);

        let h = video_harness();
        let controller = h.controller.with_scroll(Arc::new(scroll.clone()));

        controller.start().await.unwrap();
        let state = scroll.state();
        assert!(state.is_running());
        assert_eq!(state.position(), 0.0);

        clock.advance(StdDuration::from_secs(2));
        controller.stop().await.unwrap();
        let state = scroll.state();
        assert!(!state.is_running());
        assert_eq!(state.position(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_ticks_once_per_second() {
        let h = video_harness();
        h.controller.start().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(3500)).await;
        assert_eq!(h.controller.elapsed_secs(), 3);

        let capture = h.controller.stop().await.unwrap().unwrap();
        assert_eq!(capture.elapsed_secs, 3);

        tokio::time::sleep(StdDuration::from_secs(2)).await;
        assert_eq!(h.controller.elapsed_secs(), 3);
    }

    #[tokio::test]
    async fn broadcasts_lifecycle() {
        let status = StatusBroadcaster::new();
        let h = video_harness();
        let controller = h.controller.with_status(status.clone());

        controller.start().await.unwrap();
        assert_eq!(status.current().status, Status::Recording);
        controller.stop().await.unwrap();
        assert_eq!(status.current().status, Status::Idle);
    }
}
