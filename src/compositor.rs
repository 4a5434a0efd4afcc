use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::canvas::Canvas;
use crate::clock::Clock;
use crate::config::Config;
use crate::queue::FrameExchange;
use crate::source::DisplayFactory;

/// The single consumer thread: merges frames across all slot queues by
/// earliest timestamp, blits them into the canvas and paces presentation
/// against the shared clock.
pub struct Compositor {
    exchange: Arc<FrameExchange>,
    config: Arc<Config>,
    clock: Clock,
    display_factory: Box<dyn DisplayFactory>,
}

impl Compositor {
    pub fn spawn(
        exchange: Arc<FrameExchange>,
        config: Arc<Config>,
        clock: Clock,
        display_factory: Box<dyn DisplayFactory>,
    ) -> crate::Result<JoinHandle<()>> {
        let compositor = Self {
            exchange,
            config,
            clock,
            display_factory,
        };
        let handle = thread::Builder::new()
            .name("compositor".to_string())
            .spawn(move || compositor.run())?;
        Ok(handle)
    }

    fn run(self) {
        info!("Compositor started");

        // Display creation happens on this thread. Failure here is fatal to
        // the whole process: without a display target the compositor has no
        // useful function.
        let mut display = match self.display_factory.create() {
            Ok(display) => display,
            Err(e) => {
                error!("Display initialization failed, shutting down: {}", e);
                self.exchange.set_done();
                return;
            }
        };

        let mut canvas = Canvas::new(self.config.canvas_width, self.config.canvas_height);

        while !self.exchange.is_done() {
            // Merge step: earliest front pts across all slots, popped under
            // the one exchange lock. The lock is released before any pixel
            // work happens.
            let Some(frame) = self.exchange.next_frame(self.config.idle_wait) else {
                continue;
            };

            canvas.blit(&frame);

            // Pacing: present immediately when the frame is due, otherwise
            // defer until its timestamp. At most one frame is in flight; the
            // wait ends early only on shutdown.
            let now_ms = self.clock.now_ms();
            if frame.pts_ms > now_ms {
                let delay = Duration::from_millis(frame.pts_ms - now_ms);
                debug!(
                    "Slot {} frame pts {} is {}ms ahead, deferring",
                    frame.slot,
                    frame.pts_ms,
                    delay.as_millis()
                );
                self.exchange.pace_until(Instant::now() + delay);
                if self.exchange.is_done() {
                    break;
                }
            }

            if let Err(e) = display.present(&canvas) {
                warn!("Display error: {}", e);
            }
        }

        info!("Compositor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, Slot};
    use crate::source::VideoDisplay;
    use crate::{Result, WallError};
    use parking_lot::Mutex;

    /// Records the first pixel of the top-left and top-right quadrants at
    /// every present call, plus the call instant.
    struct RecordingDisplay {
        record: Arc<Mutex<Vec<(u8, u8, Instant)>>>,
    }

    impl VideoDisplay for RecordingDisplay {
        fn present(&mut self, canvas: &Canvas) -> Result<()> {
            let tl = canvas.data()[0];
            let tr_offset = canvas.width() as usize / 2 * 4;
            let tr = canvas.data()[tr_offset];
            self.record.lock().push((tl, tr, Instant::now()));
            Ok(())
        }
    }

    struct RecordingFactory {
        record: Arc<Mutex<Vec<(u8, u8, Instant)>>>,
    }

    impl DisplayFactory for RecordingFactory {
        fn create(&self) -> Result<Box<dyn VideoDisplay>> {
            Ok(Box::new(RecordingDisplay {
                record: self.record.clone(),
            }))
        }
    }

    struct FailingFactory;

    impl DisplayFactory for FailingFactory {
        fn create(&self) -> Result<Box<dyn VideoDisplay>> {
            Err(WallError::DisplayInit("no display target".to_string()))
        }
    }

    fn test_config() -> Arc<Config> {
        Arc::new(Config::with_canvas(8, 8).unwrap())
    }

    fn solid_frame(slot: Slot, pts_ms: u64, value: u8) -> Arc<Frame> {
        Arc::new(Frame::new(slot, pts_ms, 4, 4, vec![value; 4 * 4 * 4]))
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_presents_in_merge_order() {
        let exchange = Arc::new(FrameExchange::new(50));
        let record = Arc::new(Mutex::new(Vec::new()));
        let clock = Clock::new();

        // All timestamps already due: pts 0 on a clock that just started.
        for (pts, value) in [(0, 1), (2, 2), (4, 3)] {
            exchange.push(solid_frame(Slot::TopLeft, pts, value));
        }
        for (pts, value) in [(1, 11), (3, 12), (5, 13)] {
            exchange.push(solid_frame(Slot::TopRight, pts, value));
        }

        let handle = Compositor::spawn(
            exchange.clone(),
            test_config(),
            clock,
            Box::new(RecordingFactory {
                record: record.clone(),
            }),
        )
        .unwrap();

        wait_for(|| record.lock().len() >= 6);
        exchange.set_done();
        handle.join().unwrap();

        let presented: Vec<(u8, u8)> = record.lock()[..6]
            .iter()
            .map(|&(tl, tr, _)| (tl, tr))
            .collect();
        assert_eq!(
            presented,
            vec![(1, 0), (1, 11), (2, 11), (2, 12), (3, 12), (3, 13)]
        );
    }

    #[test]
    fn test_future_frame_is_deferred() {
        let exchange = Arc::new(FrameExchange::new(50));
        let record = Arc::new(Mutex::new(Vec::new()));
        let clock = Clock::new();

        let pts = clock.now_ms() + 200;
        let pushed_at = Instant::now();
        exchange.push(solid_frame(Slot::TopLeft, pts, 9));

        let handle = Compositor::spawn(
            exchange.clone(),
            test_config(),
            clock,
            Box::new(RecordingFactory {
                record: record.clone(),
            }),
        )
        .unwrap();

        wait_for(|| !record.lock().is_empty());
        exchange.set_done();
        handle.join().unwrap();

        let (tl, _, presented_at) = record.lock()[0];
        assert_eq!(tl, 9);
        assert!(presented_at.duration_since(pushed_at) >= Duration::from_millis(150));
    }

    #[test]
    fn test_display_init_failure_triggers_shutdown() {
        let exchange = Arc::new(FrameExchange::new(50));
        let handle = Compositor::spawn(
            exchange.clone(),
            test_config(),
            Clock::new(),
            Box::new(FailingFactory),
        )
        .unwrap();

        handle.join().unwrap();
        assert!(exchange.is_done());
    }

    #[test]
    fn test_exits_on_shutdown_with_empty_queues() {
        let exchange = Arc::new(FrameExchange::new(50));
        let record = Arc::new(Mutex::new(Vec::new()));
        let handle = Compositor::spawn(
            exchange.clone(),
            test_config(),
            Clock::new(),
            Box::new(RecordingFactory { record }),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        exchange.set_done();
        handle.join().unwrap();
    }
}
