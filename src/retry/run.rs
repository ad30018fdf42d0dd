//! Retry loop: run an action until it succeeds, is not handled, or no retry remains.

use tracing::debug;

use crate::control::{Cancellation, Cancelled};
use crate::error::PolicyError;
use crate::policy::Policy;

use super::policy::{RetryPolicy, RetryReason};

impl<E, T> RetryPolicy<E, T> {
    /// Run `action`, retrying handled failures and rejected values.
    ///
    /// A value rejected by every predicate is retried like a handled failure;
    /// once no retry remains the last value is returned as `Ok`.
    pub fn execute<F>(&self, cancel: &Cancellation, action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.run(cancel, action, |value| self.rejects(value))
    }

    /// Run an action without a value. Predicates are never consulted.
    pub fn execute_void<F>(&self, cancel: &Cancellation, action: F) -> Result<(), PolicyError<E>>
    where
        F: FnMut() -> Result<(), E>,
    {
        self.run(cancel, action, |_| false)
    }

    fn run<R, F, J>(&self, cancel: &Cancellation, mut action: F, rejects: J) -> Result<R, PolicyError<E>>
    where
        F: FnMut() -> Result<R, E>,
        J: Fn(&R) -> bool,
    {
        let mut attempt = 0usize;
        loop {
            cancel.check()?;
            match action() {
                Ok(value) => {
                    if !rejects(&value) {
                        return Ok(value);
                    }
                    if !self.wait_for_retry(cancel, attempt)? {
                        debug!(attempt, "value still rejected, no retry left");
                        return Ok(value);
                    }
                    self.notify(RetryReason::Rejected, attempt);
                }
                Err(failure) => {
                    if !self.config.classifier.handles(&failure) {
                        return Err(PolicyError::Failed(failure));
                    }
                    if !self.wait_for_retry(cancel, attempt)? {
                        debug!(attempt, "retries exhausted");
                        return Err(PolicyError::Exhausted {
                            attempts: attempt + 1,
                            failure,
                        });
                    }
                    self.notify(RetryReason::Failure(&failure), attempt);
                }
            }
            attempt += 1;
        }
    }

    /// Ask the schedule about `attempt` and sleep if another attempt is allowed.
    ///
    /// `Ok(false)` means no retry remains. The budget allows a retry even when
    /// the schedule's flag is false.
    fn wait_for_retry(&self, cancel: &Cancellation, attempt: usize) -> Result<bool, Cancelled> {
        let (delay, more) = self.config.backoff.at(attempt);
        let can_retry = attempt < self.config.retries || more;
        if !can_retry {
            return Ok(false);
        }
        debug!(attempt, ?delay, "backing off before retry");
        cancel.sleep(delay)?;
        Ok(true)
    }

    fn notify(&self, reason: RetryReason<'_, E>, attempt: usize) {
        if let Some(on_retry) = &self.config.on_retry {
            on_retry(reason, attempt);
        }
    }
}

impl<E, T> Policy<E, T> for RetryPolicy<E, T> {
    fn execute<F>(&self, cancel: &Cancellation, action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        RetryPolicy::execute(self, cancel, action)
    }

    fn execute_void<F>(&self, cancel: &Cancellation, action: F) -> Result<(), PolicyError<E>>
    where
        F: FnMut() -> Result<(), E>,
    {
        RetryPolicy::execute_void(self, cancel, action)
    }
}
