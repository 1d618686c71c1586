//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::config::AppConfig;

/// bio-prompter - dictate a bio, turn it into a script and rehearse it
#[derive(Parser, Debug)]
#[command(name = "bio-prompter")]
#[command(version)]
#[command(about = "Dictate a short bio, turn it into a spoken script with Google Gemini and rehearse it on a scrolling prompter")]
#[command(long_about = None)]
pub struct Cli {
    /// Gemini model to use
    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn a bio into a short spoken script
    Script(ScriptArgs),
    /// Record a spoken bio from the microphone and transcribe it
    Dictate(DictateArgs),
    /// Scroll a script in the terminal, optionally recording a take
    Rehearse(RehearseArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScriptArgs {
    /// Bio text (read from --file or stdin when omitted)
    #[arg(value_name = "BIO", conflicts_with = "file")]
    pub bio: Option<String>,

    /// Read the bio from a file
    #[arg(short = 'f', long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Extra instruction, e.g. "make it more formal"
    #[arg(short = 'r', long, value_name = "TEXT")]
    pub refine: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DictateArgs {
    /// Stop recording automatically after this long (e.g., 30s, 1m, 2m30s)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub max_duration: Option<String>,

    /// Also turn the transcribed bio into a script
    #[arg(short = 's', long)]
    pub script: bool,

    /// Extra instruction for the script
    #[arg(short = 'r', long, value_name = "TEXT", requires = "script")]
    pub refine: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RehearseArgs {
    /// Script file (read from stdin when omitted)
    #[arg(value_name = "SCRIPT")]
    pub script_file: Option<PathBuf>,

    /// Scroll speed in units per second (10-200)
    #[arg(short = 's', long, value_name = "SPEED")]
    pub speed: Option<f64>,

    /// Record a take while the prompter runs
    #[arg(long)]
    pub record: bool,

    /// Record the microphone only instead of camera and microphone
    #[arg(long, requires = "record")]
    pub audio_only: bool,

    /// Stop after this long (e.g., 30s, 1m, 2m30s)
    #[arg(short = 'd', long, value_name = "TIME")]
    pub max_duration: Option<String>,

    /// Directory for recorded takes
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// First segment of the take filename
    #[arg(long, value_name = "NAME")]
    pub purpose: Option<String>,

    /// Scroll units per script line
    #[arg(long, value_name = "UNITS")]
    pub line_height: Option<u32>,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

impl Cli {
    /// Config values given on the command line
    pub fn to_config(&self) -> AppConfig {
        let mut config = AppConfig {
            model: self.model.clone(),
            ..Default::default()
        };
        match &self.command {
            Commands::Dictate(args) => {
                config.max_duration = args.max_duration.clone();
            }
            Commands::Rehearse(args) => {
                config.speed = args.speed;
                config.max_duration = args.max_duration.clone();
                config.output_dir = args
                    .output_dir
                    .as_ref()
                    .map(|dir| dir.to_string_lossy().into_owned());
                config.purpose = args.purpose.clone();
                config.line_height = args.line_height;
            }
            Commands::Script(_) | Commands::Config { .. } => {}
        }
        config
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api_key",
    "model",
    "speed",
    "max_duration",
    "output_dir",
    "purpose",
    "line_height",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
