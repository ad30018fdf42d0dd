//! Retry configuration and the policy that owns it.

use std::fmt;
use std::sync::Arc;

use crate::backoff::BackoffSchedule;
use crate::classify::FailureClassifier;

/// Retry budget used when none is configured.
pub const DEFAULT_RETRIES: usize = 1;

/// What triggered a retry, as reported to the on-retry callback.
#[derive(Debug)]
pub enum RetryReason<'a, E> {
    /// The action failed with a handled failure.
    Failure(&'a E),
    /// The action succeeded but every value predicate rejected the value.
    Rejected,
}

/// Called after each backoff wait with the reason and the zero-based attempt index.
pub type OnRetry<E> = Arc<dyn Fn(RetryReason<'_, E>, usize) + Send + Sync>;

/// Post-success check on a produced value.
///
/// Returning `true` means the value is still unacceptable and the call should
/// retry. The first predicate returning `false` accepts the value.
pub type ValuePredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Everything a `RetryPolicy` needs to run.
pub struct RetryConfig<E, T = ()> {
    pub classifier: FailureClassifier<E>,
    pub backoff: BackoffSchedule,
    /// Retries allowed regardless of what the schedule's flag says.
    pub retries: usize,
    pub on_retry: Option<OnRetry<E>>,
    /// Ignored by `execute_void`.
    pub predicates: Vec<ValuePredicate<T>>,
}

impl<E, T> RetryConfig<E, T> {
    /// Defaults for everything except the classifier.
    pub fn new(classifier: FailureClassifier<E>) -> Self {
        Self {
            classifier,
            backoff: BackoffSchedule::default(),
            retries: DEFAULT_RETRIES,
            on_retry: None,
            predicates: Vec::new(),
        }
    }
}

impl<E, T> Default for RetryConfig<E, T> {
    fn default() -> Self {
        Self::new(FailureClassifier::all())
    }
}

impl<E, T> Clone for RetryConfig<E, T> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            backoff: self.backoff.clone(),
            retries: self.retries,
            on_retry: self.on_retry.clone(),
            predicates: self.predicates.clone(),
        }
    }
}

impl<E, T> fmt::Debug for RetryConfig<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("classifier", &self.classifier)
            .field("backoff", &self.backoff)
            .field("retries", &self.retries)
            .field("on_retry", &self.on_retry.is_some())
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// Retries a fallible action according to a [`RetryConfig`].
pub struct RetryPolicy<E, T = ()> {
    pub(super) config: RetryConfig<E, T>,
}

impl<E, T> Clone for RetryPolicy<E, T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl<E, T> fmt::Debug for RetryPolicy<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish()
    }
}

impl<E, T> RetryPolicy<E, T> {
    pub fn new(config: RetryConfig<E, T>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig<E, T> {
        &self.config
    }

    /// Adjust the configuration. Exclusive access keeps this away from
    /// in-flight calls.
    pub fn config_mut(&mut self) -> &mut RetryConfig<E, T> {
        &mut self.config
    }

    /// Whether every predicate rejects `value`. No predicates accepts everything.
    pub(super) fn rejects(&self, value: &T) -> bool {
        !self.config.predicates.is_empty()
            && self.config.predicates.iter().all(|predicate| predicate(value))
    }
}

impl<E, T> Default for RetryPolicy<E, T> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
