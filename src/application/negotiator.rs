//! Codec negotiation

use tracing::debug;

use super::ports::CapabilityOracle;
use crate::domain::capture::{
    CaptureKind, CodecChoice, AUDIO_CODEC_PREFERENCES, AUDIO_FALLBACK_CODEC,
    VIDEO_CODEC_PREFERENCES,
};

/// Pick the recording format for `kind`.
///
/// Returns the first preference the oracle supports. With no match, audio
/// falls back to `audio/webm` and video yields `CodecChoice::Unsupported`.
pub fn negotiate(kind: CaptureKind, oracle: &dyn CapabilityOracle) -> CodecChoice {
    let choice = match kind {
        CaptureKind::AudioOnly => {
            pick_first(AUDIO_CODEC_PREFERENCES, oracle, Some(AUDIO_FALLBACK_CODEC))
        }
        CaptureKind::AudioVideo => pick_first(VIDEO_CODEC_PREFERENCES, oracle, None),
    };
    debug!(%kind, codec = %choice, "negotiated recording format");
    choice
}

/// First candidate the oracle supports, else the fallback, else the sentinel
pub fn pick_first(
    candidates: &[&str],
    oracle: &dyn CapabilityOracle,
    fallback: Option<&str>,
) -> CodecChoice {
    candidates
        .iter()
        .find(|candidate| oracle.is_type_supported(candidate))
        .or(fallback.as_ref())
        .map(|mime| CodecChoice::supported(*mime))
        .unwrap_or(CodecChoice::Unsupported)
}
