//! One-shot reset timer owned by the breaker.
//!
//! The timer thread waits on a channel with a timeout. The timeout elapsing
//! runs the reset; the owning handle being dropped disconnects the channel
//! and the thread exits without touching the breaker.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;

/// Handle to a pending reset. Dropping it cancels the reset.
#[derive(Debug)]
pub(super) struct ResetTimer {
    _cancel: mpsc::Sender<()>,
}

impl ResetTimer {
    /// Run `reset` on a background thread after `after`, unless cancelled first.
    pub(super) fn schedule<F>(after: Duration, reset: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel, cancelled) = mpsc::channel::<()>();
        thread::spawn(move || match cancelled.recv_timeout(after) {
            Err(RecvTimeoutError::Timeout) => reset(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("breaker reset timer cancelled");
            }
        });
        Self { _cancel: cancel }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn fires_after_duration() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let _timer = ResetTimer::schedule(Duration::from_millis(5), move || {
            flag.store(true, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(100));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn dropping_the_handle_cancels() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let timer = ResetTimer::schedule(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst);
        });
        drop(timer);
        thread::sleep(Duration::from_millis(150));
        assert!(!fired.load(Ordering::SeqCst));
    }
}
