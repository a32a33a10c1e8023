//! # Precise Timer
//!
//! Millisecond-accurate one-shot timer built from coarse host primitives.
//!
//! A host sleep can overshoot by tens of milliseconds, a frame tick is
//! accurate but only advances one frame at a time. The timer sleeps while
//! the target is far away and switches to per-frame ticks for the last
//! [`FINE_TICK_THRESHOLD_MS`]:
//!
//! ```text
//! start ──tick──▶ remaining ≥ 200 ──sleep(remaining − 200)──▶ tick
//!                 0 < remaining < 200 ──▶ tick ──▶ ...
//!                 remaining ≤ 0 ──▶ fire(payload, overshoot)
//! ```
//!
//! The timer holds no callback. It stores a payload and hands it back from
//! [`PreciseTimer::on_wake`] when it fires, so the owner decides what to run.

use tracing::trace;

use crate::host::{Host, WakeId};

/// Remaining time (ms) below which the timer stops sleeping and ticks
pub const FINE_TICK_THRESHOLD_MS: f64 = 200.0;

#[derive(Debug)]
pub struct PreciseTimer<T> {
    target: f64,
    tick: Option<WakeId>,
    sleep: Option<WakeId>,
    payload: Option<T>,
}

impl<T> Default for PreciseTimer<T> {
    fn default() -> Self {
        Self {
            target: 0.0,
            tick: None,
            sleep: None,
            payload: None,
        }
    }
}

impl<T> PreciseTimer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `timeout` ms from now, replacing any previous
    /// registration.
    pub fn start<H: Host + ?Sized>(&mut self, host: &mut H, payload: T, timeout: f64) {
        self.clear(host);
        self.target = host.now() + timeout;
        self.payload = Some(payload);
        self.tick = Some(host.request_tick());
        trace!(target_ms = self.target, timeout, "timer armed");
    }

    pub fn is_armed(&self) -> bool {
        self.payload.is_some()
    }

    /// Host time the timer fires at, while armed
    pub fn target_time(&self) -> Option<f64> {
        self.payload.as_ref().map(|_| self.target)
    }

    /// Handle a host wake-up.
    ///
    /// Returns the payload and the overshoot (`target - now`, zero or
    /// negative) when the timer fires. Ids this timer did not request are
    /// ignored.
    pub fn on_wake<H: Host + ?Sized>(&mut self, host: &mut H, id: WakeId) -> Option<(T, f64)> {
        if self.sleep == Some(id) {
            self.sleep = None;
            self.tick = Some(host.request_tick());
            return None;
        }
        if self.tick != Some(id) {
            return None;
        }
        self.tick = None;

        let remaining = self.target - host.now();
        if remaining >= FINE_TICK_THRESHOLD_MS {
            self.sleep = Some(host.sleep(remaining - FINE_TICK_THRESHOLD_MS));
            return None;
        }
        if remaining > 0.0 {
            self.tick = Some(host.request_tick());
            return None;
        }

        trace!(overshoot = remaining, "timer fired");
        self.payload.take().map(|payload| (payload, remaining))
    }

    /// Cancel pending wake-ups and drop the payload
    pub fn clear<H: Host + ?Sized>(&mut self, host: &mut H) {
        if let Some(id) = self.tick.take() {
            host.cancel(id);
        }
        if let Some(id) = self.sleep.take() {
            host.cancel(id);
        }
        self.payload = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;

    /// Deliver wake-ups until the timer fires or `until` is reached
    fn run(
        timer: &mut PreciseTimer<&'static str>,
        host: &mut ManualHost,
        until: f64,
    ) -> Option<(&'static str, f64)> {
        while let Some(id) = host.next_wake(until) {
            if let Some(fired) = timer.on_wake(host, id) {
                return Some(fired);
            }
        }
        None
    }

    #[test]
    fn test_fires_within_one_frame() {
        let mut host = ManualHost::new();
        let mut timer = PreciseTimer::new();
        timer.start(&mut host, "go", 1000.0);
        assert_eq!(timer.target_time(), Some(1000.0));

        let (payload, overshoot) = run(&mut timer, &mut host, 2000.0).unwrap();
        assert_eq!(payload, "go");
        assert!(host.now() >= 1000.0);
        assert!(host.now() < 1000.0 + 16.0);
        assert!(overshoot <= 0.0 && overshoot > -16.0);
        assert!(!timer.is_armed());
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_sleeps_while_target_is_far() {
        let mut host = ManualHost::new();
        let mut timer = PreciseTimer::new();
        timer.start(&mut host, "go", 5000.0);

        // First tick hands off to one long sleep
        let tick = host.next_wake(f64::MAX).unwrap();
        assert!(timer.on_wake(&mut host, tick).is_none());
        assert_eq!(host.pending(), 1);
        let sleep = host.next_wake(f64::MAX).unwrap();
        assert_eq!(host.now(), 5000.0 - FINE_TICK_THRESHOLD_MS);
        assert!(timer.on_wake(&mut host, sleep).is_none());
    }

    #[test]
    fn test_zero_timeout_fires_on_next_tick() {
        let mut host = ManualHost::new();
        let mut timer = PreciseTimer::new();
        timer.start(&mut host, "now", 0.0);
        let (payload, _) = run(&mut timer, &mut host, 100.0).unwrap();
        assert_eq!(payload, "now");
        assert_eq!(host.now(), 16.0);
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let mut host = ManualHost::new();
        let mut timer = PreciseTimer::new();
        timer.start(&mut host, "stale", 100.0);
        let tick = host.next_wake(f64::MAX).unwrap();
        assert!(timer.on_wake(&mut host, tick).is_none());

        timer.clear(&mut host);
        assert!(!timer.is_armed());
        assert_eq!(host.pending(), 0);
        assert_eq!(timer.on_wake(&mut host, tick), None);
        assert_eq!(run(&mut timer, &mut host, 10_000.0), None);
    }

    #[test]
    fn test_restart_replaces_registration() {
        let mut host = ManualHost::new();
        let mut timer = PreciseTimer::new();
        timer.start(&mut host, "first", 100.0);
        timer.start(&mut host, "second", 300.0);
        assert_eq!(host.pending(), 1);
        let (payload, _) = run(&mut timer, &mut host, 1000.0).unwrap();
        assert_eq!(payload, "second");
        assert!(host.now() >= 300.0);
    }

    #[test]
    fn test_ignores_foreign_ids() {
        let mut host = ManualHost::new();
        let mut timer: PreciseTimer<()> = PreciseTimer::new();
        let foreign = host.sleep(10.0);
        timer.start(&mut host, (), 50.0);
        assert_eq!(timer.on_wake(&mut host, foreign), None);
        assert!(timer.is_armed());
    }
}
