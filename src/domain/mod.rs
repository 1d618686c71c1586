//! Domain layer - Core business logic
//!
//! Contains value objects, entities, and domain errors.
//! This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod error;
pub mod prompter;
pub mod recording;
pub mod script;
pub mod status;

// Re-export common types
pub use capture::{
    Artifact, CaptureKind, CaptureSession, CaptureStatus, CodecChoice, PermissionState,
};
pub use config::AppConfig;
pub use error::*;
pub use prompter::ScrollState;
pub use recording::Duration;
pub use status::{Status, StatusReport};
