//! Chunked Ogg/Opus recorder using cpal
//!
//! The cpal stream is not `Send`, so it is created, played and dropped on a
//! dedicated capture thread. The thread emits the Ogg header pages first,
//! then the audio captured since the previous flush once per chunk interval,
//! resampled to 16 kHz and encoded as Opus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::ogg_opus::{OggOpusStream, OGG_OPUS_MIME, SAMPLE_RATE};
use super::resample::SpeechResampler;
use crate::application::ports::{
    DeviceStream, MediaRecorder, RecorderError, RecorderEvent, RecorderEvents, RecorderFactory,
};
use crate::domain::capture::CodecChoice;

/// How often buffered audio is handed out
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const START_TIMEOUT: Duration = Duration::from_secs(3);

/// Creates `OpusChunkRecorder`s for microphone streams
#[derive(Debug, Clone, Copy)]
pub struct CpalRecorderFactory {
    chunk_interval: Duration,
}

impl CpalRecorderFactory {
    pub fn new() -> Self {
        Self {
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
        }
    }

    pub fn with_chunk_interval(chunk_interval: Duration) -> Self {
        Self { chunk_interval }
    }
}

impl Default for CpalRecorderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderFactory for CpalRecorderFactory {
    fn create(
        &self,
        stream: &DeviceStream,
        mime_type: &str,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        let requested = CodecChoice::supported(mime_type);
        let produced = CodecChoice::supported(OGG_OPUS_MIME);
        if !requested
            .essence()
            .zip(produced.essence())
            .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            return Err(RecorderError::UnsupportedMimeType(mime_type.to_string()));
        }
        if stream.audio_tracks().next().is_none() {
            return Err(RecorderError::StartFailed(
                "stream has no audio track".to_string(),
            ));
        }
        Ok(Box::new(OpusChunkRecorder::new(
            stream.clone(),
            self.chunk_interval,
        )))
    }
}

/// Records the default microphone as one Ogg/Opus stream
pub struct OpusChunkRecorder {
    stream: DeviceStream,
    chunk_interval: Duration,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl OpusChunkRecorder {
    pub fn new(stream: DeviceStream, chunk_interval: Duration) -> Self {
        Self {
            stream,
            chunk_interval,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

#[async_trait]
impl MediaRecorder for OpusChunkRecorder {
    async fn start(&mut self, events: RecorderEvents) -> Result<(), RecorderError> {
        if self.worker.is_some() {
            return Err(RecorderError::StartFailed(
                "recorder already started".to_string(),
            ));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let capture = CaptureThread {
            stream: self.stream.clone(),
            chunk_interval: self.chunk_interval,
            stop: Arc::clone(&self.stop),
            events,
        };
        let worker = std::thread::Builder::new()
            .name("bio-prompter-capture".to_string())
            .spawn(move || capture.run(ready_tx))
            .map_err(|e| RecorderError::StartFailed(e.to_string()))?;
        self.worker = Some(worker);

        match tokio::time::timeout(START_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(detail))) => Err(RecorderError::StartFailed(detail)),
            Ok(Err(_)) => Err(RecorderError::StartFailed(
                "capture thread exited during start".to_string(),
            )),
            Err(_) => {
                self.stop.store(true, Ordering::SeqCst);
                Err(RecorderError::StartFailed(
                    "microphone did not start in time".to_string(),
                ))
            }
        }
    }

    fn request_stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for OpusChunkRecorder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

struct CaptureThread {
    stream: DeviceStream,
    chunk_interval: Duration,
    stop: Arc<AtomicBool>,
    events: RecorderEvents,
}

impl CaptureThread {
    fn run(self, ready: oneshot::Sender<Result<(), String>>) {
        let buffer = Arc::new(StdMutex::new(Vec::<i16>::new()));
        let stream_error = Arc::new(StdMutex::new(None::<String>));

        let opened = open_input(&buffer, &stream_error).and_then(|(input, rate)| {
            let resampler = SpeechResampler::new(rate)?;
            let encoder = OggOpusStream::new().map_err(|e| e.to_string())?;
            Ok((input, rate, resampler, encoder))
        });
        let (input, sample_rate, mut resampler, mut encoder) = match opened {
            Ok(opened) => opened,
            Err(detail) => {
                let _ = ready.send(Err(detail));
                return;
            }
        };

        self.send(encoder.take_pages());
        let _ = ready.send(Ok(()));
        info!(sample_rate, "microphone capture running");

        let mut last_flush = Instant::now();
        let mut failure = loop {
            std::thread::sleep(POLL_INTERVAL);

            if self.stop.load(Ordering::SeqCst) {
                break None;
            }
            if !self.stream.is_live() {
                break Some("microphone was released while recording".to_string());
            }
            if let Some(detail) = lock(&stream_error).take() {
                break Some(detail);
            }
            if last_flush.elapsed() >= self.chunk_interval {
                if let Err(detail) = self.flush(&buffer, &mut resampler, &mut encoder) {
                    break Some(detail);
                }
                last_flush = Instant::now();
            }
        };

        drop(input);
        if failure.is_none() {
            failure = self
                .flush(&buffer, &mut resampler, &mut encoder)
                .and_then(|()| {
                    let tail = resampler.flush()?;
                    let mut pages = encoder.encode(&tail).map_err(|e| e.to_string())?;
                    pages.extend(encoder.finish().map_err(|e| e.to_string())?);
                    self.send(pages);
                    Ok(())
                })
                .err();
        }

        let event = match failure {
            None => {
                debug!("microphone capture stopped");
                RecorderEvent::Stopped
            }
            Some(detail) => {
                warn!(error = %detail, "microphone capture failed");
                RecorderEvent::Failed(detail)
            }
        };
        let _ = self.events.send(event);
    }

    /// Encode and send the audio buffered since the last flush
    fn flush(
        &self,
        buffer: &Arc<StdMutex<Vec<i16>>>,
        resampler: &mut SpeechResampler,
        encoder: &mut OggOpusStream,
    ) -> Result<(), String> {
        let samples = std::mem::take(&mut *lock(buffer));
        if samples.is_empty() {
            return Ok(());
        }
        let resampled = resampler.process(&samples)?;
        let pages = encoder.encode(&resampled).map_err(|e| e.to_string())?;
        self.send(pages);
        Ok(())
    }

    fn send(&self, pages: Vec<u8>) {
        if !pages.is_empty() {
            let _ = self.events.send(RecorderEvent::Data(pages));
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Average interleaved channels down to mono
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Open and play the default input device, appending mono samples to `buffer`
fn open_input(
    buffer: &Arc<StdMutex<Vec<i16>>>,
    stream_error: &Arc<StdMutex<Option<String>>>,
) -> Result<(cpal::Stream, u32), String> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| "no microphone found".to_string())?;
    let (config, sample_format) = input_config(&device)?;
    let channels = config.channels;
    let sample_rate = config.sample_rate.0;

    let on_error = {
        let stream_error = Arc::clone(stream_error);
        move |err: cpal::StreamError| {
            *lock(&stream_error) = Some(err.to_string());
        }
    };

    let input = match sample_format {
        SampleFormat::I16 => {
            let buffer = Arc::clone(buffer);
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    lock(&buffer).extend(downmix(data, channels));
                },
                on_error,
                None,
            )
        }
        SampleFormat::F32 => {
            let buffer = Arc::clone(buffer);
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                    lock(&buffer).extend(downmix(&samples, channels));
                },
                on_error,
                None,
            )
        }
        other => return Err(format!("unsupported sample format {other:?}")),
    }
    .map_err(|e| e.to_string())?;

    input.play().map_err(|e| e.to_string())?;
    Ok((input, sample_rate))
}

/// Pick an i16/f32 input config, preferring mono and 16 kHz
fn input_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), String> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| format!("failed to query input configs: {e}"))?;

    let mut best: Option<cpal::SupportedStreamConfigRange> = None;
    for range in supported {
        if !matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32) {
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => {
                range.channels() < current.channels()
                    || (includes_target(&range) && !includes_target(current))
            }
        };
        if better {
            best = Some(range);
        }
    }

    let range = best.ok_or_else(|| "no suitable input config".to_string())?;
    let sample_rate = if includes_target(&range) {
        SampleRate(SAMPLE_RATE)
    } else {
        range.min_sample_rate()
    };

    Ok((
        StreamConfig {
            channels: range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        },
        range.sample_format(),
    ))
}

fn includes_target(range: &cpal::SupportedStreamConfigRange) -> bool {
    range.min_sample_rate().0 <= SAMPLE_RATE
        && range.max_sample_rate().0 >= SAMPLE_RATE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MediaTrack, TrackKind};
    use crate::domain::capture::CaptureKind;

    struct FakeMic;

    impl MediaTrack for FakeMic {
        fn kind(&self) -> TrackKind {
            TrackKind::Audio
        }

        fn label(&self) -> String {
            "fake".to_string()
        }

        fn stop(&self) {}
    }

    fn mic_stream() -> DeviceStream {
        DeviceStream::new(CaptureKind::AudioOnly, vec![Box::new(FakeMic)])
    }

    #[test]
    fn factory_rejects_formats_it_cannot_encode() {
        let factory = CpalRecorderFactory::new();
        let err = factory.create(&mic_stream(), "audio/webm;codecs=opus").err().unwrap();
        assert_eq!(
            err,
            RecorderError::UnsupportedMimeType("audio/webm;codecs=opus".to_string())
        );
    }

    #[test]
    fn factory_accepts_ogg_opus() {
        let factory = CpalRecorderFactory::with_chunk_interval(Duration::from_millis(500));
        assert!(factory.create(&mic_stream(), OGG_OPUS_MIME).is_ok());
        assert!(factory.create(&mic_stream(), "audio/ogg").is_ok());
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(downmix(&[100, 200, 300, 400], 2), vec![150, 350]);
        assert_eq!(downmix(&[7, 8], 1), vec![7, 8]);
    }

    #[test]
    fn float_conversion_saturates() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(-1.0), -i16::MAX);
    }

    #[test]
    fn factory_requires_audio_track() {
        let empty = DeviceStream::new(CaptureKind::AudioOnly, Vec::new());
        let err = CpalRecorderFactory::new()
            .create(&empty, OGG_OPUS_MIME)
            .err()
            .unwrap();
        assert!(matches!(err, RecorderError::StartFailed(_)));
    }
}
