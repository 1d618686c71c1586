//! Camera and microphone capture through an ffmpeg child process
//!
//! ffmpeg muxes a streamable container (fragmented mp4 or webm) to stdout and
//! every read becomes one recorder chunk. SIGINT makes it flush the trailing
//! fragment and exit, which is the stop acknowledgement.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::ports::{
    failure_names, DeviceFailure, DeviceStream, MediaDevices, MediaRecorder, MediaTrack,
    RecorderError, RecorderEvent, RecorderEvents, RecorderFactory, StaticCapabilities, TrackKind,
};
use crate::domain::capture::{CaptureKind, MediaConstraints};

const DEFAULT_PROGRAM: &str = "ffmpeg";
const FRAME_RATE: &str = "30";
const READ_BUFFER_SIZE: usize = 64 * 1024;
const LIVE_CHECK_INTERVAL: Duration = Duration::from_millis(200);
/// Cameras can take a while to power up before the first fragment
const FIRST_OUTPUT_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(target_os = "macos")]
const DEFAULT_AUDIO_INPUT: &str = "0";
#[cfg(not(target_os = "macos"))]
const DEFAULT_AUDIO_INPUT: &str = "default";

/// Encoder and muxer settings for one supported mime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Muxing {
    FragmentedMp4,
    WebmVp9,
    WebmVp8,
}

impl Muxing {
    const ALL: [Muxing; 3] = [Self::FragmentedMp4, Self::WebmVp9, Self::WebmVp8];

    /// Mime types this muxing is reported under
    pub fn mime_types(&self) -> &'static [&'static str] {
        match self {
            Self::FragmentedMp4 => &["video/mp4;codecs=avc1,mp4a", "video/mp4"],
            Self::WebmVp9 => &["video/webm;codecs=vp9,opus"],
            Self::WebmVp8 => &["video/webm;codecs=vp8,opus", "video/webm"],
        }
    }

    /// ffmpeg encoders it needs
    pub fn encoders(&self) -> &'static [&'static str] {
        match self {
            Self::FragmentedMp4 => &["libx264", "aac"],
            Self::WebmVp9 => &["libvpx-vp9", "libopus"],
            Self::WebmVp8 => &["libvpx", "libopus"],
        }
    }

    pub fn for_mime(mime: &str) -> Option<Self> {
        let wanted: String = mime
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|muxing| muxing.mime_types().contains(&wanted.as_str()))
    }

    fn output_args(&self) -> Vec<&'static str> {
        let mut args = match self {
            Self::FragmentedMp4 => vec![
                "-c:v", "libx264", "-preset", "veryfast", "-tune", "zerolatency",
                "-pix_fmt", "yuv420p", "-c:a", "aac", "-b:a", "128k",
                "-movflags", "frag_keyframe+empty_moov+default_base_moof", "-f", "mp4",
            ],
            Self::WebmVp9 => vec![
                "-c:v", "libvpx-vp9", "-deadline", "realtime", "-cpu-used", "8",
                "-row-mt", "1", "-b:v", "2M", "-c:a", "libopus", "-b:a", "96k", "-f", "webm",
            ],
            Self::WebmVp8 => vec![
                "-c:v", "libvpx", "-deadline", "realtime", "-cpu-used", "8",
                "-b:v", "2M", "-c:a", "libopus", "-b:a", "96k", "-f", "webm",
            ],
        };
        args.push("pipe:1");
        args
    }
}

/// Mime types ffmpeg can stream, given the output of `ffmpeg -encoders`
pub fn muxable_formats(encoder_listing: &str) -> Vec<&'static str> {
    let available: Vec<&str> = encoder_listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            // Encoder rows start with a capability column such as "V....D"
            (flags.len() == 6).then(|| fields.next()).flatten()
        })
        .collect();

    Muxing::ALL
        .into_iter()
        .filter(|muxing| muxing.encoders().iter().all(|e| available.contains(e)))
        .flat_map(|muxing| muxing.mime_types().iter().copied())
        .collect()
}

/// Full ffmpeg command line for one recording
pub fn recording_args(
    video: &str,
    audio: Option<&str>,
    size: Option<(u32, u32)>,
    muxing: Muxing,
) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
        .into_iter()
        .map(String::from)
        .collect();
    args.extend(input_args(video, audio, size));
    args.extend(muxing.output_args().into_iter().map(String::from));
    args
}

#[cfg(target_os = "macos")]
fn input_args(video: &str, audio: Option<&str>, size: Option<(u32, u32)>) -> Vec<String> {
    let mut args = vec!["-f".to_string(), "avfoundation".to_string()];
    args.extend(["-framerate".to_string(), FRAME_RATE.to_string()]);
    if let Some((width, height)) = size {
        args.extend(["-video_size".to_string(), format!("{width}x{height}")]);
    }
    args.extend([
        "-i".to_string(),
        format!("{}:{}", video, audio.unwrap_or("none")),
    ]);
    args
}

#[cfg(not(target_os = "macos"))]
fn input_args(video: &str, audio: Option<&str>, size: Option<(u32, u32)>) -> Vec<String> {
    let mut args = vec!["-f".to_string(), "v4l2".to_string()];
    args.extend(["-framerate".to_string(), FRAME_RATE.to_string()]);
    // The driver substitutes the nearest mode it supports
    if let Some((width, height)) = size {
        args.extend(["-video_size".to_string(), format!("{width}x{height}")]);
    }
    args.extend(["-i".to_string(), video.to_string()]);
    if let Some(audio) = audio {
        args.extend(["-f", "pulse", "-i", audio].map(String::from));
    }
    args
}

/// One ffmpeg input device claimed by a stream
pub struct FfmpegInput {
    kind: TrackKind,
    device: String,
    live: AtomicBool,
}

impl FfmpegInput {
    pub fn new(kind: TrackKind, device: impl Into<String>) -> Self {
        Self {
            kind,
            device: device.into(),
            live: AtomicBool::new(true),
        }
    }
}

impl MediaTrack for FfmpegInput {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    /// ffmpeg input name of the device
    fn label(&self) -> String {
        self.device.clone()
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!(device = %self.device, "ffmpeg input released");
        }
    }
}

/// Camera plus microphone, recorded together by ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegCamera {
    program: PathBuf,
}

impl FfmpegCamera {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Formats ffmpeg has encoders for. Reports nothing when ffmpeg cannot run.
    pub async fn capabilities(&self) -> StaticCapabilities {
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let formats = muxable_formats(&String::from_utf8_lossy(&out.stdout));
                debug!(?formats, "ffmpeg video formats");
                StaticCapabilities::new(formats)
            }
            Ok(out) => {
                debug!(status = %out.status, "ffmpeg encoder listing failed");
                StaticCapabilities::none()
            }
            Err(e) => {
                debug!(error = %e, "ffmpeg not available");
                StaticCapabilities::none()
            }
        }
    }

    async fn check_program(&self) -> Result<(), DeviceFailure> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(DeviceFailure::not_supported(format!(
                "ffmpeg is not usable ({status})"
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                DeviceFailure::not_supported("ffmpeg is required for camera capture"),
            ),
            Err(e) => Err(DeviceFailure::not_supported(format!(
                "ffmpeg could not run: {e}"
            ))),
        }
    }

    #[cfg(target_os = "linux")]
    async fn find_camera(&self) -> Result<String, DeviceFailure> {
        let camera = first_video_node(Path::new("/dev"))
            .await
            .ok_or_else(|| DeviceFailure::not_found("no camera found"))?;

        // Opening the node surfaces permission problems before ffmpeg runs
        match tokio::fs::File::open(&camera).await {
            Ok(_) => Ok(camera.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
                DeviceFailure::not_allowed(format!("cannot open {}: {e}", camera.display())),
            ),
            Err(e) => Err(DeviceFailure::new(
                failure_names::NOT_READABLE,
                format!("{}: {e}", camera.display()),
            )),
        }
    }

    #[cfg(target_os = "macos")]
    async fn find_camera(&self) -> Result<String, DeviceFailure> {
        // avfoundation index of the default camera
        Ok("0".to_string())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    async fn find_camera(&self) -> Result<String, DeviceFailure> {
        Err(DeviceFailure::not_supported(
            "camera capture is not available on this platform",
        ))
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for FfmpegCamera {
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Vec<Box<dyn MediaTrack>>, DeviceFailure> {
        if constraints.video.is_none() {
            return Err(DeviceFailure::not_supported(
                "ffmpeg capture always includes a camera",
            ));
        }
        self.check_program().await?;
        let camera = self.find_camera().await?;

        info!(camera = %camera, "camera opened");
        Ok(vec![
            Box::new(FfmpegInput::new(TrackKind::Video, camera)),
            Box::new(FfmpegInput::new(TrackKind::Audio, DEFAULT_AUDIO_INPUT)),
        ])
    }
}

/// Lowest-numbered `videoN` node in `dir`
pub async fn first_video_node(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut best: Option<(u32, PathBuf)> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(index) = name
            .to_str()
            .and_then(|n| n.strip_prefix("video"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        if best.as_ref().map_or(true, |(current, _)| index < *current) {
            best = Some((index, entry.path()));
        }
    }
    best.map(|(_, path)| path)
}

/// Creates `FfmpegRecorder`s for camera streams
#[derive(Debug, Clone)]
pub struct FfmpegRecorderFactory {
    program: PathBuf,
    size: Option<(u32, u32)>,
}

impl FfmpegRecorderFactory {
    pub fn new() -> Self {
        let size = CaptureKind::AudioVideo
            .constraints()
            .video
            .map(|video| (video.ideal_width, video.ideal_height));
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            size,
        }
    }
}

impl Default for FfmpegRecorderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn create(
        &self,
        stream: &DeviceStream,
        mime_type: &str,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        let muxing = Muxing::for_mime(mime_type)
            .ok_or_else(|| RecorderError::UnsupportedMimeType(mime_type.to_string()))?;
        let video = stream.video_tracks().next().map(|t| t.label()).ok_or_else(|| {
            RecorderError::StartFailed("stream has no video track".to_string())
        })?;
        let audio = stream.audio_tracks().next().map(|t| t.label());

        let args = recording_args(&video, audio.as_deref(), self.size, muxing);
        Ok(Box::new(FfmpegRecorder::new(
            self.program.clone(),
            args,
            stream.clone(),
        )))
    }
}

/// One ffmpeg child streaming a container to stdout
pub struct FfmpegRecorder {
    program: PathBuf,
    args: Vec<String>,
    stream: DeviceStream,
    pid: Option<u32>,
    stop_requested: Arc<AtomicBool>,
    relay: Option<JoinHandle<()>>,
}

impl FfmpegRecorder {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, stream: DeviceStream) -> Self {
        Self {
            program: program.into(),
            args,
            stream,
            pid: None,
            stop_requested: Arc::new(AtomicBool::new(false)),
            relay: None,
        }
    }
}

#[async_trait]
impl MediaRecorder for FfmpegRecorder {
    async fn start(&mut self, events: RecorderEvents) -> Result<(), RecorderError> {
        if self.relay.is_some() {
            return Err(RecorderError::StartFailed(
                "recorder already started".to_string(),
            ));
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RecorderError::StartFailed("ffmpeg not found".to_string())
                } else {
                    RecorderError::StartFailed(e.to_string())
                }
            })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            RecorderError::StartFailed("ffmpeg stdout unavailable".to_string())
        })?;
        let stderr = child.stderr.take();
        self.pid = child.id();
        debug!(pid = ?self.pid, args = ?self.args, "ffmpeg started");

        let (ready_tx, ready_rx) = oneshot::channel();
        self.relay = Some(tokio::spawn(relay_output(
            child,
            stdout,
            stderr,
            self.stream.clone(),
            Arc::clone(&self.stop_requested),
            events,
            ready_tx,
        )));

        match tokio::time::timeout(FIRST_OUTPUT_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(detail))) => Err(RecorderError::StartFailed(detail)),
            Ok(Err(_)) => Err(RecorderError::StartFailed(
                "ffmpeg relay ended during start".to_string(),
            )),
            Err(_) => {
                self.request_stop();
                Err(RecorderError::StartFailed(
                    "ffmpeg produced no output in time".to_string(),
                ))
            }
        }
    }

    fn request_stop(&mut self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            interrupt(self.pid);
        }
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        if self.relay.is_some() {
            self.request_stop();
        }
    }
}

/// Forward stdout reads as chunks until ffmpeg exits, then report how it ended
async fn relay_output(
    mut child: Child,
    mut stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    stream: DeviceStream,
    stop_requested: Arc<AtomicBool>,
    events: RecorderEvents,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let diagnostics = stderr.map(|stderr| tokio::spawn(last_error_line(stderr)));
    let mut ready = Some(ready);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut live_check = tokio::time::interval(LIVE_CHECK_INTERVAL);
    let mut released = false;

    let read_error = loop {
        tokio::select! {
            read = stdout.read(&mut buffer) => match read {
                Ok(0) => break None,
                Ok(n) => {
                    let _ = events.send(RecorderEvent::Data(buffer[..n].to_vec()));
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Ok(()));
                    }
                }
                Err(e) => break Some(e.to_string()),
            },
            _ = live_check.tick(), if !released => {
                if !stream.is_live() {
                    released = true;
                    interrupt(child.id());
                }
            }
        }
    };

    let status = child.wait().await;
    let diagnostic = match diagnostics {
        Some(task) => task.await.ok().flatten(),
        None => None,
    };

    let outcome = if let Some(detail) = read_error {
        Err(detail)
    } else if released {
        Err("camera was released while recording".to_string())
    } else if stop_requested.load(Ordering::SeqCst) {
        // ffmpeg exits non-zero after SIGINT even when the output is complete
        Ok(())
    } else {
        let status = status.map_or_else(|e| e.to_string(), |s| s.to_string());
        Err(match diagnostic {
            Some(line) => format!("ffmpeg exited ({status}): {line}"),
            None => format!("ffmpeg exited ({status})"),
        })
    };

    match outcome {
        Ok(()) => {
            debug!("ffmpeg recording stopped");
            let _ = events.send(RecorderEvent::Stopped);
        }
        Err(detail) => {
            warn!(error = %detail, "ffmpeg recording failed");
            if let Some(ready) = ready.take() {
                let _ = ready.send(Err(detail.clone()));
            }
            let _ = events.send(RecorderEvent::Failed(detail));
        }
    }
}

async fn last_error_line(stderr: ChildStderr) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last = None;
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            last = Some(line);
        }
    }
    last
}

#[cfg(unix)]
fn interrupt(pid: Option<u32>) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            debug!(pid, error = %e, "failed to interrupt ffmpeg");
        }
    }
}

#[cfg(not(unix))]
fn interrupt(pid: Option<u32>) {
    // Camera capture is not offered here; kill_on_drop ends the child
    debug!(?pid, "no graceful ffmpeg stop on this platform");
}
