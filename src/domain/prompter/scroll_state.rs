//! Scroll state value object

/// Slowest allowed auto-scroll speed (units per second)
pub const MIN_SPEED: f64 = 10.0;

/// Fastest allowed auto-scroll speed (units per second)
pub const MAX_SPEED: f64 = 200.0;

/// Speed used when nothing is configured
pub const DEFAULT_SPEED: f64 = 40.0;

/// Clamp a requested speed into the allowed range.
/// NaN is treated as the slowest speed.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        return MIN_SPEED;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Position, speed and running flag of the prompter panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    position: f64,
    speed: f64,
    running: bool,
    extent: Option<f64>,
}

impl ScrollState {
    pub fn new(speed: f64) -> Self {
        Self {
            position: 0.0,
            speed: clamp_speed(speed),
            running: false,
            extent: None,
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Largest reachable offset, if the panel height is known
    pub fn extent(&self) -> Option<f64> {
        self.extent
    }

    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.speed = clamp_speed(speed);
        self.speed
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn set_extent(&mut self, extent: Option<f64>) {
        self.extent = extent.map(|e| e.max(0.0));
        self.position = self.bounded(self.position);
    }

    /// Move forward by `delta`; no-op while paused.
    pub fn advance(&mut self, delta: f64) {
        if self.running && delta > 0.0 {
            self.position = self.bounded(self.position + delta);
        }
    }

    /// Place the panel at `offset` directly
    pub fn set_position(&mut self, offset: f64) {
        self.position = self.bounded(offset.max(0.0));
    }

    pub fn at_end(&self) -> bool {
        self.extent.is_some_and(|extent| self.position >= extent)
    }

    fn bounded(&self, position: f64) -> f64 {
        match self.extent {
            Some(extent) => position.min(extent),
            None => position,
        }
    }
}

impl Default for ScrollState {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}
