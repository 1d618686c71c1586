//! Streaming Ogg/Opus encoder
//!
//! Speech settings: 16 kHz mono, VOIP application, 16 kbps VBR with in-band
//! FEC. Every call that encodes audio ends on a page boundary, so each buffer
//! it returns can be sent as its own chunk and the concatenation of all
//! buffers is one Ogg stream.

use ogg::writing::{PacketWriteEndInfo, PacketWriter};

/// Mime type produced by the microphone recorder
pub const OGG_OPUS_MIME: &str = "audio/ogg;codecs=opus";

/// Sample rate the encoder expects
pub const SAMPLE_RATE: u32 = 16_000;

/// Opus frame size in samples (20ms at 16kHz)
pub const FRAME_SIZE: usize = 320;

const TARGET_BITRATE: i32 = 16_000;
const MAX_PACKET_SIZE: usize = 4000;

/// Ogg granule positions for Opus count 48 kHz samples
const GRANULE_PER_SAMPLE: u64 = 48_000 / SAMPLE_RATE as u64;

/// Encoding errors
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Opus encoding failed: {0}")]
    Opus(String),

    #[error("Failed to write Ogg page: {0}")]
    Ogg(String),
}

/// Incremental encoder for one recording
pub struct OggOpusStream {
    encoder: opus::Encoder,
    writer: PacketWriter<'static, Vec<u8>>,
    serial: u32,
    pending: Vec<i16>,
    granule: u64,
}

impl OggOpusStream {
    /// Create the encoder and queue the identification and comment pages
    pub fn new() -> Result<Self, EncodingError> {
        let opus_err = |e: opus::Error| EncodingError::Opus(e.to_string());
        let mut encoder =
            opus::Encoder::new(SAMPLE_RATE, opus::Channels::Mono, opus::Application::Voip)
                .map_err(opus_err)?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(TARGET_BITRATE))
            .map_err(opus_err)?;
        encoder.set_vbr(true).map_err(opus_err)?;
        encoder.set_inband_fec(true).map_err(opus_err)?;

        let mut stream = Self {
            encoder,
            writer: PacketWriter::new(Vec::new()),
            serial: stream_serial(),
            pending: Vec::new(),
            granule: 0,
        };
        stream.write_headers()?;
        Ok(stream)
    }

    /// Completed pages not yet handed out
    pub fn take_pages(&mut self) -> Vec<u8> {
        std::mem::take(self.writer.inner_mut())
    }

    /// Encode every whole frame now available and return the finished pages.
    ///
    /// A partial frame stays buffered for the next call.
    pub fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>, EncodingError> {
        self.pending.extend_from_slice(samples);
        let frames = self.pending.len() / FRAME_SIZE;
        if frames > 0 {
            let whole: Vec<i16> = self.pending.drain(..frames * FRAME_SIZE).collect();
            for (i, frame) in whole.chunks(FRAME_SIZE).enumerate() {
                let end = if i + 1 == frames {
                    PacketWriteEndInfo::EndPage
                } else {
                    PacketWriteEndInfo::NormalPacket
                };
                self.write_frame(frame, end)?;
            }
        }
        Ok(self.take_pages())
    }

    /// Encode what is left, padded with silence, and close the stream
    pub fn finish(mut self) -> Result<Vec<u8>, EncodingError> {
        let mut last = std::mem::take(&mut self.pending);
        last.resize(FRAME_SIZE, 0);
        self.write_frame(&last, PacketWriteEndInfo::EndStream)?;
        Ok(self.take_pages())
    }

    fn write_frame(&mut self, frame: &[i16], end: PacketWriteEndInfo) -> Result<(), EncodingError> {
        let mut packet = vec![0u8; MAX_PACKET_SIZE];
        let len = self
            .encoder
            .encode(frame, &mut packet)
            .map_err(|e| EncodingError::Opus(e.to_string()))?;
        packet.truncate(len);

        self.granule += FRAME_SIZE as u64 * GRANULE_PER_SAMPLE;
        self.writer
            .write_packet(packet, self.serial, end, self.granule)
            .map_err(|e| EncodingError::Ogg(e.to_string()))
    }

    fn write_headers(&mut self) -> Result<(), EncodingError> {
        let mut id_header = Vec::with_capacity(19);
        id_header.extend_from_slice(b"OpusHead");
        id_header.push(1); // version
        id_header.push(1); // mono
        id_header.extend_from_slice(&0u16.to_le_bytes()); // pre-skip
        id_header.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        id_header.extend_from_slice(&0i16.to_le_bytes()); // output gain
        id_header.push(0); // channel mapping family

        let vendor = env!("CARGO_PKG_NAME").as_bytes();
        let mut comment_header = Vec::new();
        comment_header.extend_from_slice(b"OpusTags");
        comment_header.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        comment_header.extend_from_slice(vendor);
        comment_header.extend_from_slice(&0u32.to_le_bytes());

        for header in [id_header, comment_header] {
            self.writer
                .write_packet(header, self.serial, PacketWriteEndInfo::EndPage, 0)
                .map_err(|e| EncodingError::Ogg(e.to_string()))?;
        }
        Ok(())
    }
}

/// Time-derived Ogg stream serial
fn stream_serial() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() as u32) ^ now.subsec_nanos()
}
