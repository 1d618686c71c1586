//! Finalized recording value object

use base64::Engine;

/// The finalized output of one capture session.
/// Holds the concatenated chunk bytes and the mime type they were recorded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    data: Vec<u8>,
    mime_type: String,
    created_at_ms: i64,
}

impl Artifact {
    /// Concatenate chunks in the order given.
    pub fn from_chunks<I, C>(chunks: I, mime_type: impl Into<String>, created_at_ms: i64) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut data = Vec::new();
        for chunk in chunks {
            data.extend_from_slice(chunk.as_ref());
        }

        Self {
            data,
            mime_type: mime_type.into(),
            created_at_ms,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Unix timestamp (milliseconds) of finalization
    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }

    /// Payload handed to the transcription service
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Suggested download filename: `<purpose>-<context>-<unixMillis>.<ext>`
pub fn suggested_filename(purpose: &str, context: &str, timestamp_ms: i64, extension: &str) -> String {
    format!(
        "{}-{}-{}.{}",
        sanitize_segment(purpose),
        sanitize_segment(context),
        timestamp_ms,
        extension
    )
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    let collapsed = cleaned
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if collapsed.is_empty() {
        "recording".to_string()
    } else {
        collapsed
    }
}
