use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::frame::{Frame, Slot};
use crate::queue::FrameExchange;
use crate::source::{SourceFactory, VideoSource};

struct UrlState {
    desired: String,
}

struct SlotControl {
    slot: Slot,
    url: Mutex<UrlState>,
    url_changed: Condvar,
}

/// Control surface for one slot's decode worker.
///
/// `set_url` may be called concurrently from the command thread; the worker
/// itself notices the change within one polling interval, tears down the
/// active decode session, clears the slot's queue and binds the new URL.
/// An empty URL tears the session down and leaves the slot idle.
pub struct DecoderContext {
    control: Arc<SlotControl>,
    handle: Option<JoinHandle<()>>,
}

impl DecoderContext {
    /// Spawn the worker thread for `slot`. The thread lives until global
    /// shutdown is signalled on the exchange.
    pub fn spawn(
        slot: Slot,
        exchange: Arc<FrameExchange>,
        factory: Arc<dyn SourceFactory>,
        config: Arc<Config>,
        clock: Clock,
    ) -> crate::Result<Self> {
        let control = Arc::new(SlotControl {
            slot,
            url: Mutex::new(UrlState {
                desired: String::new(),
            }),
            url_changed: Condvar::new(),
        });

        let worker_control = control.clone();
        let handle = thread::Builder::new()
            .name(format!("decoder-{}", slot.index()))
            .spawn(move || {
                info!("Decode worker for slot {} started", slot);
                run_worker(&worker_control, &exchange, &*factory, &config, &clock);
                info!("Decode worker for slot {} stopped", slot);
            })?;

        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    pub fn slot(&self) -> Slot {
        self.control.slot
    }

    /// Store the desired URL for this slot. Non-blocking; the worker picks
    /// the change up on its next poll (immediately while idle, within one
    /// polling interval while decoding).
    pub fn set_url(&self, url: &str) {
        debug!("Slot {} desired URL set to {:?}", self.control.slot, url);
        self.control.url.lock().desired = url.to_string();
        self.control.url_changed.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub(crate) fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }
}

/// One worker generation: an open decode session plus its synthetic clock
/// state. Dropping it clears the slot's queue, so frames from a superseded
/// generation are never composited.
struct DecodeWorker {
    slot: Slot,
    source: Box<dyn VideoSource>,
    exchange: Arc<FrameExchange>,
    clock: Clock,
    framerate: f64,
    frame_counter: u64,
    epoch_ms: u64,
    last_pts_ms: u64,
    width: u32,
    height: u32,
}

impl DecodeWorker {
    fn open(
        slot: Slot,
        url: &str,
        exchange: Arc<FrameExchange>,
        factory: &dyn SourceFactory,
        config: &Config,
        clock: Clock,
    ) -> crate::Result<Self> {
        info!("Slot {} opening {}", slot, url);
        let source = factory.open(url)?;

        let mut framerate = source.framerate();
        if framerate <= 0.0 {
            debug!(
                "Slot {} source reports no framerate, assuming {}",
                slot, config.fallback_framerate
            );
            framerate = config.fallback_framerate;
        }

        let epoch_ms = clock.now_ms();
        Ok(Self {
            slot,
            source,
            exchange,
            clock,
            framerate,
            frame_counter: 0,
            epoch_ms,
            last_pts_ms: 0,
            width: config.quadrant_width(),
            height: config.quadrant_height(),
        })
    }

    /// Pull and emit one frame, or throttle when decoding runs too far
    /// ahead of real time.
    fn step(&mut self, config: &Config) -> crate::Result<()> {
        let now_ms = self.clock.now_ms();
        if should_throttle(self.last_pts_ms, now_ms, config.max_lead_ms) {
            thread::sleep(config.throttle_sleep);
            return Ok(());
        }

        let Some(data) = self.source.next_frame()? else {
            return Ok(());
        };

        let pts_ms = synthetic_pts(self.frame_counter, self.framerate, self.epoch_ms);
        self.frame_counter += 1;
        self.last_pts_ms = pts_ms;

        debug!(
            "Slot {} frame {} pts {} now {}",
            self.slot, self.frame_counter, pts_ms, now_ms
        );
        self.exchange
            .push(Arc::new(Frame::new(self.slot, pts_ms, self.width, self.height, data)));
        Ok(())
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        let dropped = self.exchange.clear(self.slot);
        if dropped > 0 {
            debug!("Slot {} dropped {} stale frames on teardown", self.slot, dropped);
        }
    }
}

/// True when the last emitted pts leads the clock by more than the
/// configured bound and the worker should skip pulling a source frame.
fn should_throttle(last_pts_ms: u64, now_ms: u64, max_lead_ms: u64) -> bool {
    last_pts_ms > now_ms && last_pts_ms - now_ms > max_lead_ms
}

/// Evenly-paced synthetic clock: frame index over nominal rate, anchored at
/// the generation's decode-start epoch. Independent of source-embedded
/// timestamps and arrival jitter.
fn synthetic_pts(frame_counter: u64, framerate: f64, epoch_ms: u64) -> u64 {
    epoch_ms + (frame_counter as f64 / framerate * 1000.0) as u64
}

fn run_worker(
    control: &SlotControl,
    exchange: &Arc<FrameExchange>,
    factory: &dyn SourceFactory,
    config: &Arc<Config>,
    clock: &Clock,
) {
    let slot = control.slot;
    let mut worker: Option<DecodeWorker> = None;
    let mut current_url = String::new();
    let mut last_url_check = Instant::now() - config.url_check_interval;

    while !exchange.is_done() {
        let idle = worker.is_none();
        if idle || last_url_check.elapsed() >= config.url_check_interval {
            last_url_check = Instant::now();
            let desired = {
                let mut state = control.url.lock();
                if idle && state.desired == current_url {
                    // Nothing to decode; block until a new URL arrives or the
                    // timeout lets us recheck shutdown.
                    control
                        .url_changed
                        .wait_for(&mut state, config.url_check_interval);
                }
                state.desired.clone()
            };

            if desired != current_url {
                if worker.take().is_some() {
                    info!("Slot {} tearing down decoder for {}", slot, current_url);
                }
                current_url = desired;
                if !current_url.is_empty() {
                    match DecodeWorker::open(
                        slot,
                        &current_url,
                        exchange.clone(),
                        factory,
                        config,
                        clock.clone(),
                    ) {
                        Ok(w) => worker = Some(w),
                        // No retry is scheduled: the slot stays idle until
                        // the desired URL changes again.
                        Err(e) => warn!("Slot {} stays idle: {}", slot, e),
                    }
                }
                continue;
            }
        }

        let Some(active) = worker.as_mut() else {
            continue;
        };
        if let Err(e) = active.step(config) {
            warn!("Slot {} decode error, producing stops: {}", slot, e);
            // Self-demotion: drop the session (clearing the queue) and
            // forget the URL so the slot stays idle until a new one arrives.
            worker = None;
            current_url.clear();
            control.url.lock().desired.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_when_far_ahead() {
        // Last emitted pts 5000 vs wall clock 2500: lead 2500 > 2000.
        assert!(should_throttle(5000, 2500, 2000));
    }

    #[test]
    fn test_no_throttle_at_or_under_bound() {
        assert!(!should_throttle(4500, 2500, 2000));
        assert!(!should_throttle(2500, 2500, 2000));
        assert!(!should_throttle(0, 2500, 2000));
    }

    #[test]
    fn test_synthetic_pts_paces_at_nominal_rate() {
        assert_eq!(synthetic_pts(0, 24.0, 1000), 1000);
        assert_eq!(synthetic_pts(24, 24.0, 1000), 2000);
        assert_eq!(synthetic_pts(12, 24.0, 1000), 1500);
        assert_eq!(synthetic_pts(30, 30.0, 0), 1000);
    }

    #[test]
    fn test_synthetic_pts_monotonic_within_generation() {
        let mut previous = 0;
        for counter in 1..100 {
            let pts = synthetic_pts(counter, 25.0, 500);
            assert!(pts > previous);
            previous = pts;
        }
    }
}
