use std::time::Duration;

use crate::{Result, WallError};

/// Runtime configuration, constructed once at startup and passed by
/// reference into every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Output canvas width in pixels. Must be even and nonzero.
    pub canvas_width: u32,
    /// Output canvas height in pixels. Must be even and nonzero.
    pub canvas_height: u32,
    /// Nominal frame rate assumed for sources that do not report one.
    pub fallback_framerate: f64,
    /// A worker whose last emitted pts leads the clock by more than this
    /// stops pulling source frames until the clock catches up.
    pub max_lead_ms: u64,
    /// How long a throttled worker sleeps before rechecking.
    pub throttle_sleep: Duration,
    /// Upper bound on how long a URL change can go unnoticed by a worker.
    pub url_check_interval: Duration,
    /// How long the compositor waits for a frame before rechecking shutdown.
    pub idle_wait: Duration,
    /// Queue length above which a slot's backlog is traced.
    pub queue_warn_len: usize,
    /// Grace period for worker threads to finish during shutdown; threads
    /// still running at the deadline are detached.
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            canvas_width: 1280,
            canvas_height: 720,
            fallback_framerate: 24.0,
            max_lead_ms: 2000,
            throttle_sleep: Duration::from_millis(50),
            url_check_interval: Duration::from_secs(1),
            idle_wait: Duration::from_millis(100),
            queue_warn_len: 50,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Build a configuration for the given canvas resolution.
    pub fn with_canvas(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(WallError::ConfigError(format!(
                "canvas resolution must be even and nonzero, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            canvas_width: width,
            canvas_height: height,
            ..Self::default()
        })
    }

    /// Width of one quadrant.
    pub fn quadrant_width(&self) -> u32 {
        self.canvas_width / 2
    }

    /// Height of one quadrant.
    pub fn quadrant_height(&self) -> u32 {
        self.canvas_height / 2
    }
}
