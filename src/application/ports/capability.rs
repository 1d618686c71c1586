//! Capability oracle port

/// Answers whether the runtime can record a given mime type.
///
/// Probing is synchronous and must not have side effects.
pub trait CapabilityOracle: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;
}

/// A fixed set of supported mime types
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    supported: Vec<String>,
}

impl StaticCapabilities {
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: supported.into_iter().map(Into::into).collect(),
        }
    }

    /// Reports nothing as supported
    pub fn none() -> Self {
        Self::default()
    }

    /// Everything either set supports
    pub fn union(mut self, other: StaticCapabilities) -> Self {
        self.supported.extend(other.supported);
        self
    }
}

impl CapabilityOracle for StaticCapabilities {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported
            .iter()
            .any(|s| s.eq_ignore_ascii_case(mime_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_capabilities_match_case_insensitively() {
        let caps = StaticCapabilities::new(["audio/WAV"]);
        assert!(caps.is_type_supported("audio/wav"));
        assert!(!caps.is_type_supported("audio/webm"));
        assert!(!StaticCapabilities::none().is_type_supported("audio/wav"));
    }

    #[test]
    fn union_keeps_both_sets() {
        let caps = StaticCapabilities::new(["audio/ogg"]).union(StaticCapabilities::new(["video/mp4"]));
        assert!(caps.is_type_supported("audio/ogg"));
        assert!(caps.is_type_supported("video/mp4"));
    }
}
