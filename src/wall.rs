use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::clock::Clock;
use crate::command::Command;
use crate::compositor::Compositor;
use crate::config::Config;
use crate::decoder::DecoderContext;
use crate::frame::{Slot, SLOT_COUNT};
use crate::queue::FrameExchange;
use crate::source::{DisplayFactory, SourceFactory};

/// The assembled wall: one compositor thread, four decoder contexts, and
/// the frame exchange wiring them together.
pub struct VideoWall {
    config: Arc<Config>,
    exchange: Arc<FrameExchange>,
    decoders: Vec<DecoderContext>,
    compositor: Option<JoinHandle<()>>,
}

impl VideoWall {
    /// Spawn the compositor and one decode worker per slot. All threads run
    /// until shutdown is requested.
    pub fn start(
        config: Config,
        source_factory: Arc<dyn SourceFactory>,
        display_factory: Box<dyn DisplayFactory>,
    ) -> crate::Result<Self> {
        let config = Arc::new(config);
        let clock = Clock::new();
        let exchange = Arc::new(FrameExchange::new(config.queue_warn_len));

        let compositor = Compositor::spawn(
            exchange.clone(),
            config.clone(),
            clock.clone(),
            display_factory,
        )?;

        let mut decoders = Vec::with_capacity(SLOT_COUNT);
        for slot in Slot::ALL {
            decoders.push(DecoderContext::spawn(
                slot,
                exchange.clone(),
                source_factory.clone(),
                config.clone(),
                clock.clone(),
            )?);
        }

        info!(
            "Video wall started: {} slots on a {}x{} canvas",
            SLOT_COUNT, config.canvas_width, config.canvas_height
        );

        Ok(Self {
            config,
            exchange,
            decoders,
            compositor: Some(compositor),
        })
    }

    /// Set (or clear, with an empty string) the desired URL for a slot.
    pub fn set_url(&self, slot: Slot, url: &str) {
        self.decoders[slot.index()].set_url(url);
    }

    /// Apply the `url` assignments of a re-read config source, in order.
    pub fn apply_url_commands(&self, commands: Vec<Command>) {
        for command in commands {
            if let Command::SetUrl { slot, url } = command {
                self.set_url(slot, &url);
            }
        }
    }

    pub fn queue_len(&self, slot: Slot) -> usize {
        self.exchange.len(slot)
    }

    /// Signal global shutdown without waiting for threads. Idempotent.
    pub fn request_shutdown(&self) {
        self.exchange.set_done();
    }

    pub fn is_done(&self) -> bool {
        self.exchange.is_done()
    }

    /// Signal shutdown and join every thread within the configured grace
    /// period. Threads still running at the deadline are detached rather
    /// than joined, so shutdown completes in bounded time even if a worker
    /// is stuck inside a collaborator.
    pub fn shutdown(mut self) {
        info!("Shutting down video wall");
        self.exchange.set_done();

        let deadline = Instant::now() + self.config.shutdown_grace;
        for mut context in self.decoders.drain(..) {
            let slot = context.slot();
            if let Some(handle) = context.take_handle() {
                if !join_by(handle, deadline) {
                    warn!("Decode worker for slot {} did not stop in time, detaching", slot);
                }
            }
        }
        if let Some(handle) = self.compositor.take() {
            if !join_by(handle, deadline) {
                warn!("Compositor did not stop in time, detaching");
            }
        }

        info!("Video wall stopped");
    }
}

/// Join a thread, giving up at `deadline`. Returning `false` drops the
/// handle, which detaches the thread.
fn join_by(handle: JoinHandle<()>, deadline: Instant) -> bool {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    handle.join().is_ok()
}
