use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::frame::{Frame, Slot, SLOT_COUNT};

/// The shared coordination point between the four decode workers and the
/// compositor: one pending-frame queue per slot, all guarded by a single
/// lock so the cross-slot merge always sees an atomic snapshot.
///
/// The lock is only ever held for O(1) queue operations, never across
/// decode or pixel work. The condition variable is signalled on every push
/// and on shutdown, so consumers wait instead of spinning.
pub struct FrameExchange {
    queues: Mutex<[VecDeque<Arc<Frame>>; SLOT_COUNT]>,
    frames_available: Condvar,
    done: AtomicBool,
    queue_warn_len: usize,
}

impl FrameExchange {
    pub fn new(queue_warn_len: usize) -> Self {
        Self {
            queues: Mutex::new(Default::default()),
            frames_available: Condvar::new(),
            done: AtomicBool::new(false),
            queue_warn_len,
        }
    }

    /// Append a frame to its slot's queue and wake the compositor.
    pub fn push(&self, frame: Arc<Frame>) {
        let slot = frame.slot;
        let mut queues = self.queues.lock();
        let queue = &mut queues[slot.index()];
        queue.push_back(frame);
        if queue.len() > self.queue_warn_len {
            debug!("Queue for slot {} holds {} frames", slot, queue.len());
        }
        drop(queues);
        self.frames_available.notify_all();
    }

    /// Drop every pending frame for one slot. Returns how many were dropped.
    pub fn clear(&self, slot: Slot) -> usize {
        let mut queues = self.queues.lock();
        let dropped = queues[slot.index()].len();
        queues[slot.index()].clear();
        dropped
    }

    pub fn len(&self, slot: Slot) -> usize {
        self.queues.lock()[slot.index()].len()
    }

    pub fn is_empty(&self, slot: Slot) -> bool {
        self.len(slot) == 0
    }

    /// Pop the earliest-timestamp frame across all slots, if any.
    ///
    /// Queues are scanned in fixed slot order with a strict `<` comparison,
    /// so equal timestamps resolve to the lowest slot index.
    pub fn try_next_frame(&self) -> Option<Arc<Frame>> {
        let mut queues = self.queues.lock();
        Self::pop_earliest(&mut queues)
    }

    /// Like [`try_next_frame`], but blocks until a frame is pushed, the
    /// timeout elapses, or shutdown is signalled.
    ///
    /// [`try_next_frame`]: Self::try_next_frame
    pub fn next_frame(&self, timeout: Duration) -> Option<Arc<Frame>> {
        let deadline = Instant::now() + timeout;
        let mut queues = self.queues.lock();
        loop {
            if let Some(frame) = Self::pop_earliest(&mut queues) {
                return Some(frame);
            }
            if self.is_done() || Instant::now() >= deadline {
                return None;
            }
            self.frames_available.wait_until(&mut queues, deadline);
        }
    }

    fn pop_earliest(queues: &mut [VecDeque<Arc<Frame>>; SLOT_COUNT]) -> Option<Arc<Frame>> {
        let mut winner: Option<(usize, u64)> = None;
        for (index, queue) in queues.iter().enumerate() {
            if let Some(front) = queue.front() {
                if winner.map_or(true, |(_, best_pts)| front.pts_ms < best_pts) {
                    winner = Some((index, front.pts_ms));
                }
            }
        }
        winner.and_then(|(index, _)| queues[index].pop_front())
    }

    /// Sleep until `deadline` or until shutdown is signalled, whichever
    /// comes first. Used by the compositor to defer presentation of a
    /// future-timestamped frame.
    pub fn pace_until(&self, deadline: Instant) {
        let mut queues = self.queues.lock();
        while !self.is_done() && Instant::now() < deadline {
            self.frames_available.wait_until(&mut queues, deadline);
        }
    }

    /// Signal global shutdown. Monotonic and idempotent: the flag only ever
    /// goes false -> true, and repeated calls are no-ops.
    pub fn set_done(&self) {
        self.done.store(true, Ordering::SeqCst);
        self.frames_available.notify_all();
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(slot: Slot, pts_ms: u64) -> Arc<Frame> {
        Arc::new(Frame::new(slot, pts_ms, 2, 2, vec![0u8; 16]))
    }

    #[test]
    fn test_merge_selects_globally_earliest() {
        let exchange = FrameExchange::new(50);
        for pts in [100, 200, 300] {
            exchange.push(frame(Slot::TopLeft, pts));
        }
        for pts in [150, 250, 350] {
            exchange.push(frame(Slot::TopRight, pts));
        }

        let mut order = Vec::new();
        while let Some(f) = exchange.try_next_frame() {
            order.push((f.pts_ms, f.slot.index()));
        }
        assert_eq!(
            order,
            vec![(100, 0), (150, 1), (200, 0), (250, 1), (300, 0), (350, 1)]
        );
    }

    #[test]
    fn test_equal_pts_resolve_to_lowest_slot() {
        let exchange = FrameExchange::new(50);
        exchange.push(frame(Slot::BottomRight, 500));
        exchange.push(frame(Slot::TopRight, 500));
        exchange.push(frame(Slot::BottomLeft, 500));

        let first = exchange.try_next_frame().unwrap();
        assert_eq!(first.slot, Slot::TopRight);
        let second = exchange.try_next_frame().unwrap();
        assert_eq!(second.slot, Slot::BottomLeft);
        let third = exchange.try_next_frame().unwrap();
        assert_eq!(third.slot, Slot::BottomRight);
    }

    #[test]
    fn test_clear_drops_only_that_slot() {
        let exchange = FrameExchange::new(50);
        for pts in [1, 2, 3, 4, 5] {
            exchange.push(frame(Slot::TopRight, pts));
        }
        exchange.push(frame(Slot::TopLeft, 10));

        assert_eq!(exchange.clear(Slot::TopRight), 5);
        assert!(exchange.is_empty(Slot::TopRight));
        assert_eq!(exchange.len(Slot::TopLeft), 1);
    }

    #[test]
    fn test_next_frame_times_out_empty() {
        let exchange = FrameExchange::new(50);
        let start = Instant::now();
        assert!(exchange.next_frame(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_push_wakes_waiting_consumer() {
        let exchange = Arc::new(FrameExchange::new(50));
        let producer = {
            let exchange = exchange.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                exchange.push(frame(Slot::BottomLeft, 7));
            })
        };
        let got = exchange.next_frame(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(got.unwrap().pts_ms, 7);
    }

    #[test]
    fn test_set_done_is_idempotent_and_wakes_waiters() {
        let exchange = Arc::new(FrameExchange::new(50));
        let waiter = {
            let exchange = exchange.clone();
            thread::spawn(move || exchange.next_frame(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(10));
        exchange.set_done();
        exchange.set_done();
        assert!(exchange.is_done());
        assert!(waiter.join().unwrap().is_none());
    }

    #[test]
    fn test_pace_until_ends_early_on_shutdown() {
        let exchange = Arc::new(FrameExchange::new(50));
        let pacer = {
            let exchange = exchange.clone();
            thread::spawn(move || {
                let start = Instant::now();
                exchange.pace_until(Instant::now() + Duration::from_secs(30));
                start.elapsed()
            })
        };
        thread::sleep(Duration::from_millis(20));
        exchange.set_done();
        let waited = pacer.join().unwrap();
        assert!(waited < Duration::from_secs(1));
    }
}
