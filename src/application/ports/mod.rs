//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod artifact_store;
pub mod capability;
pub mod clock;
pub mod config;
pub mod devices;
pub mod recorder;
pub mod transcriber;

// Re-export common types
pub use artifact_store::{ArtifactRef, ArtifactStore, StoreError};
pub use capability::{CapabilityOracle, StaticCapabilities};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ConfigStore;
pub use devices::{
    failure_names, DeviceFailure, DeviceStream, MediaDevices, MediaTrack, TrackKind,
};
pub use recorder::{MediaRecorder, RecorderError, RecorderEvent, RecorderEvents, RecorderFactory};
pub use transcriber::{ScriptWriter, ServiceError, Transcriber};
