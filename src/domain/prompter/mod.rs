//! Prompter domain module

mod scroll_state;

pub use scroll_state::{clamp_speed, ScrollState, DEFAULT_SPEED, MAX_SPEED, MIN_SPEED};
