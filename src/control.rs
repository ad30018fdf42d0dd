//! Per-call cancellation: a shared abort flag plus an optional deadline.
//!
//! The caller keeps one clone of a `Cancellation` and passes another into
//! `execute`/`execute_void`. Setting the flag (or passing the deadline) stops
//! the retry loop before its next attempt or wait; an action already running
//! is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest single sleep while waiting on a cancellable backoff.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Why a call was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel()` was called on the token.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
}

/// Error returned when a call stops because its token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    pub reason: CancelReason,
}

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            CancelReason::Cancelled => write!(f, "call cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "call deadline exceeded"),
        }
    }
}

impl std::error::Error for Cancelled {}

/// Cancellation token for one or more policy calls. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token nobody holds a handle to; only useful when no cancellation is wanted.
    pub fn never() -> Self {
        Self::default()
    }

    /// Same flag as `self`, additionally firing at `deadline`.
    ///
    /// An earlier existing deadline wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(deadline),
        }
    }

    /// Same flag as `self`, firing after `timeout`. A timeout too large to
    /// represent as an `Instant` adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Fire the token for every clone sharing its flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        if self.flag.load(Ordering::Acquire) {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// `Err(Cancelled)` if the token has fired.
    pub fn check(&self) -> Result<(), Cancelled> {
        match self.reason() {
            Some(reason) => Err(Cancelled { reason }),
            None => Ok(()),
        }
    }

    /// Sleep for `duration`, waking early if the token fires.
    ///
    /// Returns `Err(Cancelled)` when the wait was cut short. A duration too
    /// large to represent as an `Instant` waits until the token fires.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let until = Instant::now().checked_add(duration);
        loop {
            self.check()?;
            let now = Instant::now();
            let mut slice = match until {
                Some(until) if now >= until => return Ok(()),
                Some(until) => (until - now).min(SLEEP_SLICE),
                None => SLEEP_SLICE,
            };
            if let Some(deadline) = self.deadline {
                slice = slice.min(deadline.saturating_duration_since(now));
            }
            std::thread::sleep(slice);
        }
    }
}
