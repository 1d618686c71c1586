//! Configuration domain module

mod app_config;

pub use app_config::{AppConfig, DEFAULT_LINE_HEIGHT, DEFAULT_MODEL, DEFAULT_PURPOSE};
