//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>s, <number>m, or <number>m<number>s (e.g., 30s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

/// Failures of the capture core, classified at their point of origin.
///
/// Every device, session and service failure the controller surfaces is one
/// of these. None of them is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Permission to use the capture device was denied")]
    PermissionDenied,

    #[error("No matching capture device was found")]
    DeviceNotFound,

    #[error("Capture is not allowed outside a secure context")]
    InsecureContext,

    #[error("Capture is not supported here: {0}")]
    UnsupportedCapability(String),

    #[error("No supported recording format is available")]
    UnsupportedCodec,

    #[error("No active device stream")]
    NoActiveStream,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("{0}")]
    ServiceFailure(String),

    #[error("Unexpected capture failure: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Whether the failure is caused by a blocked device permission
    pub fn is_permission_related(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_failure_message_is_verbatim() {
        let err = CaptureError::ServiceFailure("Rate limit exceeded".to_string());
        assert_eq!(err.to_string(), "Rate limit exceeded");
    }

    #[test]
    fn only_permission_denied_is_permission_related() {
        assert!(CaptureError::PermissionDenied.is_permission_related());
        assert!(!CaptureError::DeviceNotFound.is_permission_related());
        assert!(!CaptureError::InsecureContext.is_permission_related());
        assert!(!CaptureError::Unknown("x".into()).is_permission_related());
    }
}
