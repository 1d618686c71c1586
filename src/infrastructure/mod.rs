//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like cpal, the Gemini API
//! and the filesystem.

pub mod capture;
pub mod config;
pub mod storage;
pub mod text_service;

// Re-export adapters
pub use capture::{HostDevices, HostRecorders};
pub use config::XdgConfigStore;
pub use storage::FsArtifactStore;
pub use text_service::GeminiClient;
