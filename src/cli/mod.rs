//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, signal handling,
//! the terminal prompter and the command runners.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod presenter;
pub mod prompter_view;
pub mod signals;

// Re-export commonly used types
pub use app::{run_dictate, run_rehearse, run_script, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction};
pub use presenter::Presenter;
