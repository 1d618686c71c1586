//! Scroll synchronization engine
//!
//! Time-delta auto-scroll for the prompter panel. Distance travelled depends
//! only on speed and elapsed clock time, never on how often `tick` runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use super::ports::Clock;
use crate::domain::prompter::ScrollState;

/// Default frame rate of the render loop
pub const DEFAULT_FPS: u32 = 60;

/// Entry points a capture controller uses to drive the prompter
pub trait ScrollSync: Send + Sync {
    /// Jump back to the top
    fn reset(&self);

    fn run(&self);

    fn pause(&self);
}

pub struct ScrollEngine {
    state: ScrollState,
    clock: Arc<dyn Clock>,
    last_tick: Duration,
}

impl ScrollEngine {
    pub fn new(clock: Arc<dyn Clock>, speed: f64) -> Self {
        let last_tick = clock.now();
        Self {
            state: ScrollState::new(speed),
            clock,
            last_tick,
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.state.position()
    }

    pub fn speed(&self) -> f64 {
        self.state.speed()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Advance by `speed * seconds since the previous tick`.
    ///
    /// The tick time is recorded even while paused, so resuming never jumps.
    pub fn tick(&mut self) -> f64 {
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.last_tick);
        self.last_tick = now;
        self.state.advance(self.state.speed() * elapsed.as_secs_f64());
        self.state.position()
    }

    pub fn run(&mut self) {
        if self.state.is_running() {
            return;
        }
        self.last_tick = self.clock.now();
        self.state.set_running(true);
        debug!(position = self.state.position(), "scroll running");
    }

    /// Stop scrolling, crediting the time since the last tick first
    pub fn pause(&mut self) {
        if !self.state.is_running() {
            return;
        }
        self.tick();
        self.state.set_running(false);
        debug!(position = self.state.position(), "scroll paused");
    }

    pub fn reset(&mut self) {
        self.last_tick = self.clock.now();
        self.state.set_position(0.0);
    }

    /// Change speed; the time already elapsed is credited at the old speed.
    /// Returns the clamped speed.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        if self.state.is_running() {
            self.tick();
        }
        self.state.set_speed(speed)
    }

    /// User scrolled the panel by hand. Ignored while auto-scrolling.
    pub fn manual_scroll(&mut self, offset: f64) -> bool {
        if self.state.is_running() {
            return false;
        }
        self.state.set_position(offset);
        true
    }

    pub fn set_extent(&mut self, extent: Option<f64>) {
        self.state.set_extent(extent);
    }
}

/// Thread-safe handle to one `ScrollEngine`, shared between the capture
/// controller and the render loop.
#[derive(Clone)]
pub struct SharedScroll {
    inner: Arc<Mutex<ScrollEngine>>,
}

impl SharedScroll {
    pub fn new(engine: ScrollEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn with_clock(clock: Arc<dyn Clock>, speed: f64) -> Self {
        Self::new(ScrollEngine::new(clock, speed))
    }

    pub fn state(&self) -> ScrollState {
        self.lock().state()
    }

    /// Tick and return the resulting state
    pub fn tick(&self) -> ScrollState {
        let mut engine = self.lock();
        engine.tick();
        engine.state()
    }

    pub fn set_speed(&self, speed: f64) -> f64 {
        self.lock().set_speed(speed)
    }

    pub fn manual_scroll(&self, offset: f64) -> bool {
        self.lock().manual_scroll(offset)
    }

    pub fn set_extent(&self, extent: Option<f64>) {
        self.lock().set_extent(extent);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScrollEngine> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ScrollSync for SharedScroll {
    fn reset(&self) {
        self.lock().reset();
    }

    fn run(&self) {
        self.lock().run();
    }

    fn pause(&self) {
        self.lock().pause();
    }
}

/// Tick `scroll` at `fps` and hand every frame to `render` until `shutdown`
/// flips to true or its sender is dropped.
pub async fn run_frame_loop<F>(
    scroll: SharedScroll,
    fps: u32,
    mut shutdown: watch::Receiver<bool>,
    mut render: F,
) where
    F: FnMut(&ScrollState),
{
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {
                let state = scroll.tick();
                render(&state);
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("frame loop stopped");
}
