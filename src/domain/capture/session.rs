//! Capture session state machine

use std::fmt;
use thiserror::Error;

use super::artifact::Artifact;
use super::codec::CodecChoice;

/// Capture session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureStatus {
    #[default]
    Idle,
    Recording,
    Finalizing,
}

impl CaptureStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: CaptureStatus,
    pub action: String,
}

/// One start -> stop recording cycle.
///
/// State machine:
///   IDLE -> RECORDING (begin)
///   RECORDING -> FINALIZING (request_stop)
///   FINALIZING -> IDLE (finalize / abandon)
///
/// Chunks are kept in arrival order; that order is the byte order of the
/// finalized artifact.
#[derive(Debug, Default)]
pub struct CaptureSession {
    status: CaptureStatus,
    chunks: Vec<Vec<u8>>,
    elapsed_secs: u64,
    codec: Option<CodecChoice>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn is_idle(&self) -> bool {
        self.status == CaptureStatus::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.status == CaptureStatus::Recording
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn codec(&self) -> Option<&CodecChoice> {
        self.codec.as_ref()
    }

    /// Transition from IDLE to RECORDING, discarding any leftover state of the
    /// previous cycle.
    pub fn begin(&mut self, codec: CodecChoice) -> Result<(), InvalidStateTransition> {
        if self.status != CaptureStatus::Idle {
            return Err(self.invalid("start recording"));
        }
        self.chunks.clear();
        self.elapsed_secs = 0;
        self.codec = Some(codec);
        self.status = CaptureStatus::Recording;
        Ok(())
    }

    /// Buffer a chunk. Chunks that trail in after the stop request are still
    /// part of this session; anything arriving while idle is dropped.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> bool {
        if self.status == CaptureStatus::Idle {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// One elapsed-time tick. Only counts while recording.
    pub fn tick_second(&mut self) {
        if self.status == CaptureStatus::Recording {
            self.elapsed_secs += 1;
        }
    }

    /// Transition from RECORDING to FINALIZING
    pub fn request_stop(&mut self) -> Result<(), InvalidStateTransition> {
        if self.status != CaptureStatus::Recording {
            return Err(self.invalid("stop recording"));
        }
        self.status = CaptureStatus::Finalizing;
        Ok(())
    }

    /// Transition from FINALIZING to IDLE, producing the artifact.
    pub fn finalize(&mut self, created_at_ms: i64) -> Result<Artifact, InvalidStateTransition> {
        if self.status != CaptureStatus::Finalizing {
            return Err(self.invalid("finalize recording"));
        }
        let mime_type = self
            .codec
            .as_ref()
            .and_then(CodecChoice::mime_type)
            .unwrap_or_default()
            .to_string();
        let chunks = std::mem::take(&mut self.chunks);
        self.status = CaptureStatus::Idle;
        Ok(Artifact::from_chunks(chunks, mime_type, created_at_ms))
    }

    /// Drop buffered data and return to IDLE without producing an artifact
    pub fn abandon(&mut self) {
        self.chunks.clear();
        self.status = CaptureStatus::Idle;
    }

    fn invalid(&self, action: &str) -> InvalidStateTransition {
        InvalidStateTransition {
            current_state: self.status,
            action: action.to_string(),
        }
    }
}
