use std::time::Instant;

/// Monotonic wall-clock shared by the decode workers and the compositor.
///
/// All presentation timestamps are expressed in milliseconds on this clock:
/// workers sample it once per generation for the synthetic pts epoch, the
/// compositor compares frame timestamps against it when pacing.
#[derive(Debug, Clone)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created.
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
