//! # Host Capabilities
//!
//! The player never reads a clock or sleeps on its own. A [`Host`] supplies a
//! monotonic clock in milliseconds and two coarse wake-up sources:
//!
//! - **tick**: fires on the next frame (roughly 16 ms away on a display host)
//! - **sleep**: fires after at least the requested time, with poor precision
//!
//! Every request returns a [`WakeId`]. The host later hands that id back to
//! [`LyricPlayer::wake`](crate::player::LyricPlayer::wake), which routes it to
//! the timer that asked for it.
//!
//! ## Implementations
//! - [`ManualHost`] - virtual clock advanced by the caller, used by tests and
//!   offline rendering
//! - [`SystemHost`] - wall clock backed by [`Instant`] and a blocking wait

use std::thread;
use std::time::{Duration, Instant};

/// Identifier of one pending wake-up request
pub type WakeId = u64;

/// Default frame interval for tick requests (ms)
pub const DEFAULT_FRAME_MS: f64 = 16.0;

/// Clock and wake-up sources the player runs on
pub trait Host {
    /// Monotonic time in ms
    fn now(&self) -> f64;
    /// Wake up on the next frame
    fn request_tick(&mut self) -> WakeId;
    /// Wake up after `ms`
    fn sleep(&mut self, ms: f64) -> WakeId;
    /// Drop a pending request; unknown ids are ignored
    fn cancel(&mut self, id: WakeId);
}

/// Pending wake-ups with their deadlines
#[derive(Debug, Default)]
pub struct WakeQueue {
    last_id: WakeId,
    pending: Vec<(f64, WakeId)>,
}

impl WakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: f64) -> WakeId {
        self.last_id += 1;
        self.pending.push((deadline, self.last_id));
        self.last_id
    }

    pub fn cancel(&mut self, id: WakeId) {
        self.pending.retain(|&(_, pending)| pending != id);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn earliest(&self) -> Option<usize> {
        // Equal deadlines fire in request order
        (0..self.pending.len()).min_by(|&a, &b| {
            let (da, ia) = self.pending[a];
            let (db, ib) = self.pending[b];
            da.total_cmp(&db).then(ia.cmp(&ib))
        })
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.earliest().map(|i| self.pending[i].0)
    }

    /// Remove and return the earliest request
    pub fn pop_next(&mut self) -> Option<(f64, WakeId)> {
        let index = self.earliest()?;
        Some(self.pending.remove(index))
    }
}

/// Virtual-clock host driven by the caller
#[derive(Debug)]
pub struct ManualHost {
    now: f64,
    frame_interval: f64,
    queue: WakeQueue,
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualHost {
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_MS)
    }

    pub fn with_frame_interval(frame_interval: f64) -> Self {
        Self {
            now: 0.0,
            frame_interval,
            queue: WakeQueue::new(),
        }
    }

    /// Move the clock forward without delivering any wake-up
    pub fn advance(&mut self, ms: f64) {
        self.now += ms.max(0.0);
    }

    /// Number of outstanding requests
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Advance to the next wake-up due no later than `until` and return its
    /// id. When nothing is due by then the clock stops at `until`.
    pub fn next_wake(&mut self, until: f64) -> Option<WakeId> {
        match self.queue.next_deadline() {
            Some(deadline) if deadline <= until => {
                let (deadline, id) = self.queue.pop_next()?;
                self.now = self.now.max(deadline);
                Some(id)
            }
            _ => {
                self.now = self.now.max(until);
                None
            }
        }
    }
}

impl Host for ManualHost {
    fn now(&self) -> f64 {
        self.now
    }

    fn request_tick(&mut self) -> WakeId {
        self.queue.schedule(self.now + self.frame_interval)
    }

    fn sleep(&mut self, ms: f64) -> WakeId {
        self.queue.schedule(self.now + ms.max(0.0))
    }

    fn cancel(&mut self, id: WakeId) {
        self.queue.cancel(id);
    }
}

/// Wall-clock host for a single-threaded blocking event loop
#[derive(Debug)]
pub struct SystemHost {
    epoch: Instant,
    frame_interval: f64,
    queue: WakeQueue,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            frame_interval: DEFAULT_FRAME_MS,
            queue: WakeQueue::new(),
        }
    }

    /// Block until the earliest request is due and return its id.
    /// Returns `None` once nothing is pending.
    pub fn wait_next(&mut self) -> Option<WakeId> {
        let deadline = self.queue.next_deadline()?;
        let remaining = deadline - self.now();
        if remaining > 0.0 {
            thread::sleep(Duration::from_secs_f64(remaining / 1000.0));
        }
        self.queue.pop_next().map(|(_, id)| id)
    }
}

impl Host for SystemHost {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn request_tick(&mut self) -> WakeId {
        let deadline = self.now() + self.frame_interval;
        self.queue.schedule(deadline)
    }

    fn sleep(&mut self, ms: f64) -> WakeId {
        let deadline = self.now() + ms.max(0.0);
        self.queue.schedule(deadline)
    }

    fn cancel(&mut self, id: WakeId) {
        self.queue.cancel(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_orders_by_deadline_then_id() {
        let mut queue = WakeQueue::new();
        let late = queue.schedule(50.0);
        let first = queue.schedule(10.0);
        let second = queue.schedule(10.0);
        assert_eq!(queue.pop_next(), Some((10.0, first)));
        assert_eq!(queue.pop_next(), Some((10.0, second)));
        assert_eq!(queue.pop_next(), Some((50.0, late)));
        assert_eq!(queue.pop_next(), None);
    }

    #[test]
    fn test_manual_host_delivers_in_order() {
        let mut host = ManualHost::new();
        let sleep = host.sleep(100.0);
        let tick = host.request_tick();
        assert_eq!(host.next_wake(1000.0), Some(tick));
        assert_eq!(host.now(), 16.0);
        assert_eq!(host.next_wake(1000.0), Some(sleep));
        assert_eq!(host.now(), 100.0);
        assert_eq!(host.next_wake(1000.0), None);
        assert_eq!(host.now(), 1000.0);
    }

    #[test]
    fn test_manual_host_stops_at_limit() {
        let mut host = ManualHost::new();
        host.sleep(500.0);
        assert_eq!(host.next_wake(200.0), None);
        assert_eq!(host.now(), 200.0);
        assert_eq!(host.pending(), 1);
    }

    #[test]
    fn test_cancelled_request_never_delivered() {
        let mut host = ManualHost::new();
        let id = host.sleep(10.0);
        host.cancel(id);
        host.cancel(id);
        assert_eq!(host.next_wake(100.0), None);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_system_host_clock_is_monotonic() {
        let mut host = SystemHost::new();
        let before = host.now();
        let id = host.sleep(1.0);
        assert_eq!(host.wait_next(), Some(id));
        assert!(host.now() >= before + 1.0);
        assert_eq!(host.wait_next(), None);
    }
}
