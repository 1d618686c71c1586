//! bio-prompter - dictate a bio, script it with Google Gemini and rehearse it
//!
//! This crate records a spoken bio from the microphone, transcribes it and
//! turns it into a short script, then scrolls that script on a prompter
//! while optionally recording a take.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Capture sessions, codecs, scroll state, statuses and errors
//! - **Application**: Capture controller, device sessions, scroll engine, use cases and ports
//! - **Infrastructure**: Adapter implementations (cpal, Gemini, filesystem, XDG config)
//! - **CLI**: Command-line interface, terminal prompter and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
