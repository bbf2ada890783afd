//! Bounded polling with an injectable clock.
//!
//! The host gives no completion events, so every wait in the crate is a
//! poll-with-deadline: check a predicate, sleep a fixed interval, give up at
//! `max_wait`. Routing all of them through [`poll_until`] keeps timeout
//! semantics identical for the queue transport and every readiness gate, and
//! lets tests substitute [`ManualClock`] so no test ever really sleeps.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of time and sleeping for all polling loops.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);

    /// Time elapsed since `start`.
    fn elapsed_since(&self, start: Instant) -> Duration {
        self.now().saturating_duration_since(start)
    }
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock: `sleep` advances time instantly.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// Move virtual time forward without a sleep call.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Total virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Result of a bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResult {
    /// Whether the predicate became true before the deadline
    pub satisfied: bool,
    /// How long the poll waited in total
    pub waited: Duration,
}

/// Poll `predicate` every `interval` until it returns true or `max_wait` passes.
///
/// The predicate is evaluated immediately, after every sleep, and one final
/// time at the deadline. The last sleep is clipped to the remaining budget,
/// so a timed-out poll reports `waited == max_wait` on a manual clock.
pub fn poll_until<C, F>(clock: &C, interval: Duration, max_wait: Duration, mut predicate: F) -> PollResult
where
    C: Clock + ?Sized,
    F: FnMut() -> bool,
{
    let start = clock.now();
    let step = if interval.is_zero() {
        Duration::from_millis(1)
    } else {
        interval
    };

    loop {
        if predicate() {
            return PollResult {
                satisfied: true,
                waited: clock.elapsed_since(start),
            };
        }

        let waited = clock.elapsed_since(start);
        if waited >= max_wait {
            return PollResult {
                satisfied: false,
                waited,
            };
        }

        clock.sleep(step.min(max_wait - waited));
    }
}
