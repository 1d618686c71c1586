//! Application layer - Use cases and port interfaces
//!
//! Contains the capture and prompter services, the use cases built on them
//! and the trait definitions for external system interactions.

pub mod capture_controller;
pub mod device_session;
pub mod dictate;
pub mod negotiator;
pub mod ports;
pub mod script;
pub mod scroll_engine;
pub mod status;

// Re-export services and use cases
pub use capture_controller::{CaptureConfig, CaptureController, Delivery, FinalizedCapture};
pub use device_session::DeviceSessionManager;
pub use dictate::{DictateBioUseCase, DictateError, DictationOutput};
pub use negotiator::negotiate;
pub use script::{GenerateScriptUseCase, ScriptError};
pub use scroll_engine::{run_frame_loop, ScrollEngine, ScrollSync, SharedScroll, DEFAULT_FPS};
pub use status::StatusBroadcaster;
