//! Streaming resampler to the Opus input rate

use rubato::{FftFixedIn, Resampler};

use super::ogg_opus::SAMPLE_RATE;

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts mono 16-bit audio from the device rate to 16 kHz, keeping state
/// between calls so chunk boundaries do not click.
pub struct SpeechResampler {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
    ratio: f64,
}

impl SpeechResampler {
    pub fn new(source_rate: u32) -> Result<Self, String> {
        let inner = if source_rate == SAMPLE_RATE {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                source_rate as usize,
                SAMPLE_RATE as usize,
                CHUNK_SIZE,
                SUB_CHUNKS,
                1,
            )
            .map_err(|e| format!("resampler init failed: {e}"))?;
            Some(resampler)
        };

        Ok(Self {
            inner,
            pending: Vec::new(),
            ratio: f64::from(SAMPLE_RATE) / f64::from(source_rate),
        })
    }

    /// Resample every whole input block now available
    pub fn process(&mut self, samples: &[i16]) -> Result<Vec<i16>, String> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.pending
            .extend(samples.iter().map(|&s| f32::from(s) / 32768.0));

        let mut output = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let block: Vec<f32> = self.pending.drain(..needed).collect();
            output.extend(run_block(resampler, block)?);
        }
        Ok(output)
    }

    /// Resample the buffered tail, padding the last block with silence
    pub fn flush(&mut self) -> Result<Vec<i16>, String> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        let expected = (self.pending.len() as f64 * self.ratio).ceil() as usize;
        let mut block = std::mem::take(&mut self.pending);
        block.resize(resampler.input_frames_next(), 0.0);
        let mut output = run_block(resampler, block)?;
        output.truncate(expected);
        Ok(output)
    }
}

fn run_block(resampler: &mut FftFixedIn<f32>, block: Vec<f32>) -> Result<Vec<i16>, String> {
    let wave = vec![block];
    let resampled = resampler
        .process(&wave, None)
        .map_err(|e| format!("resampling failed: {e}"))?;
    Ok(resampled[0]
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect())
}
