//! Backoff schedules: how long to wait before the next attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps a zero-based attempt index to `(wait, more_available)`.
///
/// The flag, not the duration, tells the retry loop whether the schedule
/// itself asks for another attempt. The loop may still retry on a `false`
/// flag while the retry budget allows it.
#[derive(Clone)]
pub struct BackoffSchedule {
    next: Arc<dyn Fn(usize) -> (Duration, bool) + Send + Sync>,
}

impl fmt::Debug for BackoffSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackoffSchedule")
    }
}

impl Default for BackoffSchedule {
    /// One nanosecond for every index, never asking for more attempts.
    fn default() -> Self {
        Self::constant(Duration::from_nanos(1))
    }
}

impl BackoffSchedule {
    pub fn from_fn<F>(next: F) -> Self
    where
        F: Fn(usize) -> (Duration, bool) + Send + Sync + 'static,
    {
        Self {
            next: Arc::new(next),
        }
    }

    /// No wait, no extra attempts; only the retry budget drives retries.
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// The same wait for every index, never asking for more attempts.
    pub fn constant(delay: Duration) -> Self {
        Self::from_fn(move |_| (delay, false))
    }

    /// Wait `delays[i]` before retry `i`, asking for one attempt per listed delay.
    ///
    /// Past the end of the list the last delay is reported with `false`.
    /// An empty list behaves like [`BackoffSchedule::none`].
    pub fn fixed(delays: Vec<Duration>) -> Self {
        let delays: Arc<[Duration]> = delays.into();
        Self::from_fn(move |index| match delays.get(index) {
            Some(delay) => (*delay, true),
            None => (delays.last().copied().unwrap_or(Duration::ZERO), false),
        })
    }

    /// Doubling waits starting at `base`, capped at `max`, asking for
    /// `attempts` retries.
    pub fn exponential(base: Duration, max: Duration, attempts: usize) -> Self {
        Self::from_fn(move |index| {
            // Shift is bounded so the multiplier cannot overflow.
            let factor = 1u32 << index.min(16);
            let delay = base.saturating_mul(factor).min(max);
            (delay, index < attempts)
        })
    }

    /// Query the schedule for `index`.
    pub fn at(&self, index: usize) -> (Duration, bool) {
        (self.next)(index)
    }
}
