//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::prompter::{clamp_speed, DEFAULT_SPEED};
use crate::domain::recording::Duration;

/// Gemini model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Filename prefix for saved takes
pub const DEFAULT_PURPOSE: &str = "bio";

/// Scroll units per rendered script line
pub const DEFAULT_LINE_HEIGHT: u32 = 24;

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub speed: Option<f64>,
    pub max_duration: Option<String>,
    pub output_dir: Option<String>,
    pub purpose: Option<String>,
    pub line_height: Option<u32>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            api_key: None,
            model: Some(DEFAULT_MODEL.to_string()),
            speed: Some(DEFAULT_SPEED),
            max_duration: Some(Duration::default_max_duration().to_string()),
            output_dir: None,
            purpose: Some(DEFAULT_PURPOSE.to_string()),
            line_height: Some(DEFAULT_LINE_HEIGHT),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_key: other.api_key.or(self.api_key),
            model: other.model.or(self.model),
            speed: other.speed.or(self.speed),
            max_duration: other.max_duration.or(self.max_duration),
            output_dir: other.output_dir.or(self.output_dir),
            purpose: other.purpose.or(self.purpose),
            line_height: other.line_height.or(self.line_height),
        }
    }

    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Configured speed, clamped into the prompter range
    pub fn speed_or_default(&self) -> f64 {
        clamp_speed(self.speed.unwrap_or(DEFAULT_SPEED))
    }

    /// Get max_duration as parsed Duration, or default if not set/invalid
    pub fn max_duration_or_default(&self) -> Duration {
        self.max_duration
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_max_duration)
    }

    /// Directory where takes are written; falls back to the user's videos
    /// directory, then the current directory.
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| dirs::video_dir().map(|dir| dir.join("bio-prompter")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn purpose_or_default(&self) -> &str {
        self.purpose.as_deref().unwrap_or(DEFAULT_PURPOSE)
    }

    pub fn line_height_or_default(&self) -> u32 {
        self.line_height
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_LINE_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete_except_secrets() {
        let config = AppConfig::defaults();
        assert!(config.api_key.is_none());
        assert!(config.output_dir.is_none());
        assert_eq!(config.model.as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(config.speed, Some(DEFAULT_SPEED));
        assert_eq!(config.max_duration.as_deref(), Some("5m"));
    }

    #[test]
    fn merge_prefers_other() {
        let base = AppConfig {
            api_key: Some("base".to_string()),
            speed: Some(30.0),
            ..Default::default()
        };
        let other = AppConfig {
            api_key: Some("other".to_string()),
            ..Default::default()
        };
        let merged = base.merge(other);
        assert_eq!(merged.api_key.as_deref(), Some("other"));
        assert_eq!(merged.speed, Some(30.0));
    }

    #[test]
    fn speed_or_default_clamps() {
        let config = AppConfig {
            speed: Some(900.0),
            ..Default::default()
        };
        assert_eq!(config.speed_or_default(), 200.0);
        assert_eq!(AppConfig::empty().speed_or_default(), DEFAULT_SPEED);
    }

    #[test]
    fn max_duration_falls_back_on_invalid() {
        let config = AppConfig {
            max_duration: Some("soon".to_string()),
            ..Default::default()
        };
        assert_eq!(config.max_duration_or_default().as_secs(), 300);

        let config = AppConfig {
            max_duration: Some("90s".to_string()),
            ..Default::default()
        };
        assert_eq!(config.max_duration_or_default().as_secs(), 90);
    }

    #[test]
    fn output_dir_uses_configured_path() {
        let config = AppConfig {
            output_dir: Some("/tmp/takes".to_string()),
            ..Default::default()
        };
        assert_eq!(config.output_dir_or_default(), PathBuf::from("/tmp/takes"));
    }

    #[test]
    fn zero_line_height_uses_default() {
        let config = AppConfig {
            line_height: Some(0),
            ..Default::default()
        };
        assert_eq!(config.line_height_or_default(), DEFAULT_LINE_HEIGHT);
        assert_eq!(AppConfig::empty().purpose_or_default(), "bio");
        assert_eq!(AppConfig::empty().model_or_default(), DEFAULT_MODEL);
    }
}
