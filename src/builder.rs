//! Builder entry point: choose which failures to handle, then build a policy.
//!
//! ```
//! use std::time::Duration;
//! use fusebox::{Cancellation, Handle, RetryOption};
//!
//! let policy = Handle::<std::io::Error>::all().retry::<()>([
//!     RetryOption::Durations(vec![Duration::from_millis(1); 3]),
//! ]);
//! let result = policy.execute_void(&Cancellation::never(), || Ok(()));
//! assert!(result.is_ok());
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::BackoffSchedule;
use crate::breaker::{CircuitBreakerConfig, CircuitBreakerPolicy, OnBreak, OnReset};
use crate::classify::{ErrorType, FailureClassifier};
use crate::retry::{OnRetry, RetryConfig, RetryPolicy, RetryReason, ValuePredicate};

/// Retry-specific configuration option.
///
/// Options may be given in any order. A repeated setting keeps the last
/// value; value predicates accumulate.
pub enum RetryOption<E, T = ()> {
    Backoff(BackoffSchedule),
    /// Shorthand for [`BackoffSchedule::fixed`].
    Durations(Vec<Duration>),
    Retries(usize),
    OnRetry(OnRetry<E>),
    RetryOnValue(ValuePredicate<T>),
}

impl<E, T> RetryOption<E, T> {
    pub fn on_retry<F>(callback: F) -> Self
    where
        F: Fn(RetryReason<'_, E>, usize) + Send + Sync + 'static,
    {
        RetryOption::OnRetry(Arc::new(callback))
    }

    /// Retry while `predicate` returns true for the produced value.
    pub fn retry_on_value<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        RetryOption::RetryOnValue(Arc::new(predicate))
    }

    fn apply(self, config: &mut RetryConfig<E, T>) {
        match self {
            RetryOption::Backoff(schedule) => config.backoff = schedule,
            RetryOption::Durations(delays) => config.backoff = BackoffSchedule::fixed(delays),
            RetryOption::Retries(retries) => config.retries = retries,
            RetryOption::OnRetry(callback) => config.on_retry = Some(callback),
            RetryOption::RetryOnValue(predicate) => config.predicates.push(predicate),
        }
    }
}

impl<E, T> fmt::Debug for RetryOption<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryOption::Backoff(schedule) => f.debug_tuple("Backoff").field(schedule).finish(),
            RetryOption::Durations(delays) => f.debug_tuple("Durations").field(delays).finish(),
            RetryOption::Retries(retries) => f.debug_tuple("Retries").field(retries).finish(),
            RetryOption::OnRetry(_) => f.write_str("OnRetry"),
            RetryOption::RetryOnValue(_) => f.write_str("RetryOnValue"),
        }
    }
}

/// Breaker-specific configuration option.
pub enum BreakerOption<E> {
    /// Cool-down keyed by consecutive failures; the schedule's flag is ignored.
    CoolDown(BackoffSchedule),
    /// Shorthand for a constant cool-down.
    BrokenFor(Duration),
    MaxFailures(usize),
    OnBreak(OnBreak<E>),
    OnReset(OnReset),
}

impl<E> BreakerOption<E> {
    pub fn on_break<F>(callback: F) -> Self
    where
        F: Fn(&E, Duration) + Send + Sync + 'static,
    {
        BreakerOption::OnBreak(Arc::new(callback))
    }

    pub fn on_reset<F>(callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        BreakerOption::OnReset(Arc::new(callback))
    }

    fn apply(self, config: &mut CircuitBreakerConfig<E>) {
        match self {
            BreakerOption::CoolDown(schedule) => config.cool_down = schedule,
            BreakerOption::BrokenFor(cool_down) => {
                config.cool_down = BackoffSchedule::constant(cool_down)
            }
            BreakerOption::MaxFailures(max_failures) => config.max_failures = max_failures,
            BreakerOption::OnBreak(callback) => config.on_break = Some(callback),
            BreakerOption::OnReset(callback) => config.on_reset = Some(callback),
        }
    }
}

impl<E> fmt::Debug for BreakerOption<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerOption::CoolDown(schedule) => f.debug_tuple("CoolDown").field(schedule).finish(),
            BreakerOption::BrokenFor(d) => f.debug_tuple("BrokenFor").field(d).finish(),
            BreakerOption::MaxFailures(n) => f.debug_tuple("MaxFailures").field(n).finish(),
            BreakerOption::OnBreak(_) => f.write_str("OnBreak"),
            BreakerOption::OnReset(_) => f.write_str("OnReset"),
        }
    }
}

/// First stage of building a policy: which failures it handles.
pub struct Handle<E> {
    classifier: FailureClassifier<E>,
}

impl<E> Clone for Handle<E> {
    fn clone(&self) -> Self {
        Self::classifier(self.classifier.clone())
    }
}

impl<E> fmt::Debug for Handle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl<E> Handle<E> {
    pub fn classifier(classifier: FailureClassifier<E>) -> Self {
        Self { classifier }
    }

    pub fn all() -> Self {
        Self::classifier(FailureClassifier::all())
    }

    pub fn when<F>(check: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::classifier(FailureClassifier::when(check))
    }

    /// Handle failures of the same variant as `sample`.
    pub fn kind_of(sample: &E) -> Self
    where
        E: 'static,
    {
        Self::classifier(FailureClassifier::kind_of(sample))
    }

    pub fn or(self, other: FailureClassifier<E>) -> Self {
        Self::classifier(self.classifier.or(other))
    }

    pub fn or_when<F>(self, check: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::classifier(self.classifier.or_when(check))
    }

    pub fn or_kind_of(self, sample: &E) -> Self
    where
        E: 'static,
    {
        Self::classifier(self.classifier.or_kind_of(sample))
    }

    /// Build a retry policy from `options` on top of the defaults.
    pub fn retry<T>(self, options: impl IntoIterator<Item = RetryOption<E, T>>) -> RetryPolicy<E, T> {
        let mut config = RetryConfig::new(self.classifier);
        for option in options {
            option.apply(&mut config);
        }
        RetryPolicy::new(config)
    }

    /// Build a closed circuit breaker from `options` on top of the defaults.
    pub fn circuit_breaker(
        self,
        options: impl IntoIterator<Item = BreakerOption<E>>,
    ) -> CircuitBreakerPolicy<E> {
        let mut config = CircuitBreakerConfig::new(self.classifier);
        for option in options {
            option.apply(&mut config);
        }
        CircuitBreakerPolicy::new(config)
    }
}

impl<E: ErrorType> Handle<E> {
    /// Handle failures whose concrete error type is `T`.
    pub fn of_type<T>() -> Self
    where
        T: Error + Send + Sync + 'static,
    {
        Self::classifier(FailureClassifier::of_type::<T>())
    }

    pub fn or_type<T>(self) -> Self
    where
        T: Error + Send + Sync + 'static,
    {
        Self::classifier(self.classifier.or_type::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::DEFAULT_MAX_FAILURES;
    use crate::retry::DEFAULT_RETRIES;

    #[derive(Debug)]
    enum Fault {
        Busy,
    }

    #[test]
    fn retry_defaults_without_options() {
        let policy = Handle::<Fault>::all().retry::<()>([]);
        assert_eq!(policy.config().retries, DEFAULT_RETRIES);
        assert!(policy.config().on_retry.is_none());
        assert!(policy.config().predicates.is_empty());
    }

    #[test]
    fn retry_options_apply_in_order() {
        let policy = Handle::<Fault>::all().retry::<u8>([
            RetryOption::Retries(2),
            RetryOption::retry_on_value(|v: &u8| *v == 0),
            RetryOption::Retries(4),
            RetryOption::retry_on_value(|v: &u8| *v == 1),
            RetryOption::Durations(vec![Duration::from_millis(3)]),
        ]);
        assert_eq!(policy.config().retries, 4);
        assert_eq!(policy.config().predicates.len(), 2);
        assert_eq!(policy.config().backoff.at(0), (Duration::from_millis(3), true));
    }

    #[test]
    fn breaker_options_apply() {
        let cb = Handle::kind_of(&Fault::Busy).circuit_breaker([
            BreakerOption::MaxFailures(5),
            BreakerOption::BrokenFor(Duration::from_millis(250)),
            BreakerOption::on_reset(|| {}),
        ]);
        assert_eq!(cb.config().max_failures, 5);
        assert_eq!(cb.config().cool_down.at(5).0, Duration::from_millis(250));
        assert!(cb.config().on_reset.is_some());
        assert!(cb.config().on_break.is_none());
    }

    #[test]
    fn breaker_defaults_without_options() {
        let cb = Handle::<Fault>::all().circuit_breaker([]);
        assert_eq!(cb.config().max_failures, DEFAULT_MAX_FAILURES);
        assert!(!cb.is_open());
    }
}
