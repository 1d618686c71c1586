//! End-to-end capture flows against in-memory devices and recorders

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use bio_prompter::application::ports::{
    DeviceFailure, DeviceStream, ManualClock, MediaDevices, MediaRecorder, MediaTrack,
    RecorderError, RecorderEvent, RecorderEvents, RecorderFactory, StaticCapabilities, TrackKind,
};
use bio_prompter::application::{
    CaptureConfig, CaptureController, Delivery, DeviceSessionManager, DictateBioUseCase,
    ScrollSync, SharedScroll, StatusBroadcaster,
};
use bio_prompter::domain::capture::{CaptureKind, CaptureStatus, MediaConstraints, PermissionState};
use bio_prompter::domain::error::CaptureError;
use bio_prompter::domain::status::Status;
use bio_prompter::infrastructure::{FsArtifactStore, GeminiClient};

struct FakeTrack {
    kind: TrackKind,
    stops: Arc<AtomicUsize>,
}

impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        format!("fake {:?}", self.kind)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeDevices {
    refuse: Option<&'static str>,
    opens: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, DeviceFailure> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = self.refuse {
            return Err(DeviceFailure::new(name, "refused by user"));
        }

        let mut tracks: Vec<Box<dyn MediaTrack>> = vec![Box::new(FakeTrack {
            kind: TrackKind::Audio,
            stops: Arc::clone(&self.stops),
        })];
        if constraints.video.is_some() {
            tracks.push(Box::new(FakeTrack {
                kind: TrackKind::Video,
                stops: Arc::clone(&self.stops),
            }));
        }
        Ok(tracks)
    }
}

/// Hands the test the event sender of the most recently started recorder
#[derive(Clone, Default)]
struct Feed {
    events: Arc<Mutex<Option<RecorderEvents>>>,
    started: Arc<AtomicUsize>,
    /// Data the recorder flushes between the stop request and `Stopped`
    trailing: Arc<Mutex<Option<Vec<u8>>>>,
}

impl Feed {
    fn chunk(&self, bytes: &[u8]) {
        let events = self.events.lock().unwrap();
        events
            .as_ref()
            .expect("recorder not started")
            .send(RecorderEvent::Data(bytes.to_vec()))
            .unwrap();
    }
}

struct FeedRecorder {
    feed: Feed,
}

#[async_trait]
impl MediaRecorder for FeedRecorder {
    async fn start(&mut self, events: RecorderEvents) -> Result<(), RecorderError> {
        self.feed.started.fetch_add(1, Ordering::SeqCst);
        *self.feed.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn request_stop(&mut self) {
        if let Some(events) = self.feed.events.lock().unwrap().take() {
            if let Some(tail) = self.feed.trailing.lock().unwrap().take() {
                let _ = events.send(RecorderEvent::Data(tail));
            }
            let _ = events.send(RecorderEvent::Stopped);
        }
    }
}

struct FeedFactory {
    feed: Feed,
    mime_types: Arc<Mutex<Vec<String>>>,
}

impl RecorderFactory for FeedFactory {
    fn create(
        &self,
        _stream: &DeviceStream,
        mime_type: &str,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        self.mime_types.lock().unwrap().push(mime_type.to_string());
        Ok(Box::new(FeedRecorder {
            feed: self.feed.clone(),
        }))
    }
}

type Controller = CaptureController<FakeDevices, FeedFactory, FsArtifactStore>;

struct Rig {
    controller: Controller,
    feed: Feed,
    mime_types: Arc<Mutex<Vec<String>>>,
    status: StatusBroadcaster,
    _dir: tempfile::TempDir,
}

fn rig(kind: CaptureKind, supported: &[&str], devices: FakeDevices) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let feed = Feed::default();
    let mime_types = Arc::new(Mutex::new(Vec::new()));
    let status = StatusBroadcaster::new();
    let controller = CaptureController::new(
        CaptureConfig::new(kind).with_purpose("Ada Lovelace"),
        Arc::new(DeviceSessionManager::new(devices)),
        Arc::new(StaticCapabilities::new(supported.iter().copied())),
        FeedFactory {
            feed: feed.clone(),
            mime_types: Arc::clone(&mime_types),
        },
        FsArtifactStore::new(dir.path()),
        Arc::new(ManualClock::with_unix_millis(1_717_171_717_000)),
    )
    .with_status(status.clone());

    Rig {
        controller,
        feed,
        mime_types,
        status,
        _dir: dir,
    }
}

#[tokio::test]
async fn audio_chunks_concatenate_in_arrival_order() {
    const TAIL: &[u8] = b"\xff\xfe\xfd";

    for count in [0usize, 1, 2, 5, 17] {
        let rig = rig(
            CaptureKind::AudioOnly,
            &["audio/mp4", "audio/ogg;codecs=opus"],
            FakeDevices::default(),
        );
        *rig.feed.trailing.lock().unwrap() = Some(TAIL.to_vec());

        rig.controller.start().await.unwrap();
        assert_eq!(rig.status.current().status, Status::Recording);

        let mut expected = Vec::new();
        for n in 0..count {
            let chunk = vec![n as u8; 1 + (n * 37) % 11];
            rig.feed.chunk(&chunk);
            expected.extend_from_slice(&chunk);
        }
        expected.extend_from_slice(TAIL);

        let capture = rig.controller.stop().await.unwrap().unwrap();
        assert_eq!(capture.artifact.data(), expected.as_slice(), "{count} chunks");
        assert!(capture.artifact.data().ends_with(TAIL));
        assert_eq!(capture.artifact.mime_type(), "audio/mp4");
        assert!(matches!(capture.delivery, Delivery::Base64(_)));
        assert_eq!(
            *rig.mime_types.lock().unwrap(),
            vec!["audio/mp4".to_string()]
        );
        assert_eq!(rig.status.current().status, Status::Idle);
    }
}

#[tokio::test]
async fn refused_permission_is_reported_as_permission_error() {
    let rig = rig(
        CaptureKind::AudioOnly,
        &["audio/webm"],
        FakeDevices {
            refuse: Some("NotAllowedError"),
            ..Default::default()
        },
    );

    let err = rig.controller.start().await.unwrap_err();
    assert_eq!(err, CaptureError::PermissionDenied);
    assert_eq!(rig.controller.devices().permission(), PermissionState::Denied);

    let report = rig.status.current();
    assert_eq!(report.status, Status::Error);
    assert!(report.permission_related);
    assert!(report.hint.is_some());
    assert_eq!(rig.controller.status(), CaptureStatus::Idle);
}

#[tokio::test]
async fn second_start_is_rejected_and_one_artifact_results() {
    let rig = rig(CaptureKind::AudioVideo, &["video/webm"], FakeDevices::default());

    rig.controller.start().await.unwrap();
    let second = rig.controller.start().await;
    assert_eq!(second, Err(CaptureError::AlreadyRecording));
    assert_eq!(rig.feed.started.load(Ordering::SeqCst), 1);
    assert_eq!(rig.status.current().status, Status::Recording);

    rig.feed.chunk(b"take");
    let capture = rig.controller.stop().await.unwrap().unwrap();
    assert_eq!(capture.artifact.data(), b"take");
    assert!(rig.controller.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn video_take_is_written_to_disk() {
    let rig = rig(
        CaptureKind::AudioVideo,
        &["video/webm;codecs=vp9,opus", "video/webm"],
        FakeDevices::default(),
    );

    rig.controller.start().await.unwrap();
    rig.feed.chunk(b"\x1aE\xdf\xa3");
    rig.feed.chunk(b"cluster");
    let capture = rig.controller.stop().await.unwrap().unwrap();

    let Delivery::Download {
        reference,
        filename,
    } = capture.delivery
    else {
        panic!("video takes are stored");
    };
    assert_eq!(filename, "ada-lovelace-video-1717171717000.webm");
    assert!(reference.uri().ends_with(&filename));

    let written = std::fs::read(reference.uri()).unwrap();
    assert_eq!(written, b"\x1aE\xdf\xa3cluster");
    assert_eq!(rig.controller.current_filename(), Some(filename));
}

#[tokio::test]
async fn new_take_replaces_previous_file() {
    let rig = rig(CaptureKind::AudioVideo, &["video/mp4"], FakeDevices::default());

    rig.controller.start().await.unwrap();
    rig.feed.chunk(b"first");
    rig.controller.stop().await.unwrap().unwrap();
    let first = rig.controller.current_artifact().unwrap();
    assert!(std::path::Path::new(first.uri()).exists());

    rig.controller.start().await.unwrap();
    rig.feed.chunk(b"second");
    rig.controller.stop().await.unwrap().unwrap();
    let second = rig.controller.current_artifact().unwrap();

    // Same clock millis, so the name repeats; the content must be the new take
    assert_eq!(std::fs::read(second.uri()).unwrap(), b"second");
    assert!(rig.controller.discard_artifact().await.unwrap());
    assert!(!std::path::Path::new(second.uri()).exists());
}

#[tokio::test]
async fn double_acquire_returns_the_same_stream() {
    let devices = FakeDevices::default();
    let opens = Arc::clone(&devices.opens);
    let stops = Arc::clone(&devices.stops);
    let manager = DeviceSessionManager::new(devices);

    let first = manager.acquire(CaptureKind::AudioVideo).await.unwrap();
    let second = manager.acquire(CaptureKind::AudioVideo).await.unwrap();
    assert!(first.same_as(&second));
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(manager.permission(), PermissionState::Granted);

    manager.release();
    manager.release();
    assert_eq!(stops.load(Ordering::SeqCst), 2);
    assert!(!first.is_live());
}

#[tokio::test]
async fn recording_drives_the_prompter() {
    let clock = Arc::new(ManualClock::new());
    let scroll = SharedScroll::with_clock(clock.clone(), 50.0);

    let dir = tempfile::tempdir().unwrap();
    let feed = Feed::default();
    let controller = CaptureController::new(
        CaptureConfig::new(CaptureKind::AudioOnly),
        Arc::new(DeviceSessionManager::new(FakeDevices::default())),
        Arc::new(StaticCapabilities::new(["audio/wav"])),
        FeedFactory {
            feed: feed.clone(),
            mime_types: Arc::default(),
        },
        FsArtifactStore::new(dir.path()),
        clock.clone(),
    )
    .with_scroll(Arc::new(scroll.clone()));

    scroll.manual_scroll(120.0);
    controller.start().await.unwrap();
    assert!(scroll.state().is_running());
    assert_eq!(scroll.state().position(), 0.0);

    clock.advance(std::time::Duration::from_secs(2));
    assert!((scroll.tick().position() - 100.0).abs() < 1e-6);

    feed.chunk(b"RIFF");
    controller.stop().await.unwrap();
    assert!(!scroll.state().is_running());

    clock.advance(std::time::Duration::from_secs(5));
    assert!((scroll.tick().position() - 100.0).abs() < 1e-6);

    // Pausing twice leaves the position alone
    scroll.pause();
    assert!((scroll.state().position() - 100.0).abs() < 1e-6);
}

#[tokio::test]
async fn dictation_sends_recorded_audio_for_transcription() {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "inlineData": { "mimeType": "audio/wav", "data": "UklGRmRhdGE=" } }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I'm Ada." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rig = rig(CaptureKind::AudioOnly, &["audio/wav"], FakeDevices::default());
    let status = rig.status.clone();
    let feed = rig.feed.clone();
    let client = GeminiClient::with_model("key", "gemini-test").with_base_url(server.uri());
    let dictation = DictateBioUseCase::new(Arc::new(rig.controller), client).with_status(status.clone());

    dictation.start().await.unwrap();
    feed.chunk(b"RIFF");
    feed.chunk(b"data");
    let output = dictation.finish().await.unwrap();

    assert_eq!(output.text, "I'm Ada.");
    assert_eq!(output.audio_size, "8 B");
    assert_eq!(status.current().status, Status::Idle);
}
