//! Circuit-breaker policy.
//!
//! Counts consecutive handled failures. Once the count reaches the
//! configured threshold the circuit opens: calls are rejected with
//! [`PolicyError::CircuitBroken`] without running the action, until a single
//! reset timer scheduled by the breaking call closes it again.
//!
//! The counter and open flag live behind one mutex held only for their
//! read-modify-write; actions themselves run concurrently. Callbacks run
//! outside the lock and must not call back into the same breaker.

mod state;
mod timer;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backoff::BackoffSchedule;
use crate::classify::FailureClassifier;
use crate::control::Cancellation;
use crate::error::PolicyError;
use crate::policy::Policy;

use state::{BreakerState, FailureOutcome};
use timer::ResetTimer;

pub use state::CircuitState;

/// Consecutive failures that open the circuit when none is configured.
pub const DEFAULT_MAX_FAILURES: usize = 1;

/// Cool-down used when none is configured.
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(2);

/// Called when the circuit opens, with the triggering failure and the cool-down.
pub type OnBreak<E> = Arc<dyn Fn(&E, Duration) + Send + Sync>;

/// Called on the timer thread after the circuit closes again.
pub type OnReset = Arc<dyn Fn() + Send + Sync>;

/// Everything a `CircuitBreakerPolicy` needs to run.
pub struct CircuitBreakerConfig<E> {
    pub classifier: FailureClassifier<E>,
    pub max_failures: usize,
    /// Cool-down keyed by the consecutive-failure count at the break.
    /// Only the duration is used; the schedule's flag is ignored.
    pub cool_down: BackoffSchedule,
    pub on_break: Option<OnBreak<E>>,
    pub on_reset: Option<OnReset>,
}

impl<E> CircuitBreakerConfig<E> {
    pub fn new(classifier: FailureClassifier<E>) -> Self {
        Self {
            classifier,
            max_failures: DEFAULT_MAX_FAILURES,
            cool_down: BackoffSchedule::constant(DEFAULT_COOL_DOWN),
            on_break: None,
            on_reset: None,
        }
    }
}

impl<E> Default for CircuitBreakerConfig<E> {
    fn default() -> Self {
        Self::new(FailureClassifier::all())
    }
}

impl<E> Clone for CircuitBreakerConfig<E> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            max_failures: self.max_failures,
            cool_down: self.cool_down.clone(),
            on_break: self.on_break.clone(),
            on_reset: self.on_reset.clone(),
        }
    }
}

impl<E> fmt::Debug for CircuitBreakerConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("classifier", &self.classifier)
            .field("max_failures", &self.max_failures)
            .field("cool_down", &self.cool_down)
            .field("on_break", &self.on_break.is_some())
            .field("on_reset", &self.on_reset.is_some())
            .finish()
    }
}

/// Lock a mutex, recovering from poison. The guarded data has no invariant
/// that a panic mid-update can break.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("circuit breaker mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Fails fast after consecutive handled failures; recovers after a cool-down.
///
/// Share one instance (e.g. behind an `Arc`) between all callers of the
/// protected operation. Dropping it cancels a pending reset.
pub struct CircuitBreakerPolicy<E> {
    config: CircuitBreakerConfig<E>,
    state: Arc<Mutex<BreakerState>>,
    /// Reset timer of the latest break, tagged with that break's generation.
    timer: Mutex<Option<(u64, ResetTimer)>>,
}

impl<E> fmt::Debug for CircuitBreakerPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerPolicy")
            .field("config", &self.config)
            .field("state", &*lock_recovering(&self.state))
            .finish()
    }
}

impl<E> Default for CircuitBreakerPolicy<E> {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl<E> CircuitBreakerPolicy<E> {
    /// A closed breaker with a zero counter.
    pub fn new(config: CircuitBreakerConfig<E>) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(BreakerState::default())),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig<E> {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        lock_recovering(&self.state).circuit_state()
    }

    pub fn is_open(&self) -> bool {
        lock_recovering(&self.state).is_open()
    }

    pub fn consecutive_failures(&self) -> usize {
        lock_recovering(&self.state).consecutive_failures()
    }

    /// Run `action` once unless the circuit is open.
    pub fn execute<T, F>(&self, cancel: &Cancellation, action: F) -> Result<T, PolicyError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if self.is_open() {
            return Err(PolicyError::CircuitBroken);
        }
        cancel.check()?;

        match action() {
            Ok(value) => {
                lock_recovering(&self.state).record_success();
                Ok(value)
            }
            Err(failure) => {
                if self.config.classifier.handles(&failure) {
                    self.record_failure(&failure);
                }
                Err(PolicyError::Failed(failure))
            }
        }
    }

    pub fn execute_void<F>(&self, cancel: &Cancellation, action: F) -> Result<(), PolicyError<E>>
    where
        F: FnOnce() -> Result<(), E>,
    {
        self.execute(cancel, action)
    }

    fn record_failure(&self, failure: &E) {
        let outcome = lock_recovering(&self.state).record_failure(self.config.max_failures);
        match outcome {
            FailureOutcome::Counted {
                consecutive_failures,
            } => {
                debug!(
                    consecutive_failures,
                    max_failures = self.config.max_failures,
                    "circuit breaker counted failure"
                );
            }
            FailureOutcome::AlreadyOpen => {
                debug!("circuit breaker failure arrived after the circuit opened");
            }
            FailureOutcome::Broke {
                consecutive_failures,
                generation,
            } => {
                let (cool_down, _) = self.config.cool_down.at(consecutive_failures);
                info!(consecutive_failures, ?cool_down, "circuit breaker opened");
                if let Some(on_break) = &self.config.on_break {
                    on_break(failure, cool_down);
                }
                self.schedule_reset(generation, cool_down);
            }
        }
    }

    /// Arm the single reset timer for the break identified by `generation`.
    fn schedule_reset(&self, generation: u64, cool_down: Duration) {
        let state = Arc::clone(&self.state);
        let on_reset = self.config.on_reset.clone();
        let timer = ResetTimer::schedule(cool_down, move || {
            if !lock_recovering(&state).reset(generation) {
                return;
            }
            info!("circuit breaker reset");
            if let Some(on_reset) = on_reset {
                on_reset();
            }
        });
        // A stored timer from an older break has already fired. One from a
        // newer break is still pending and must stay armed.
        let mut slot = lock_recovering(&self.timer);
        let armed = slot.as_ref().map(|(armed, _)| *armed);
        match armed {
            Some(armed) if armed > generation => {
                debug!(generation, armed, "newer reset timer already armed");
            }
            _ => *slot = Some((generation, timer)),
        }
    }
}

impl<E, T> Policy<E, T> for CircuitBreakerPolicy<E> {
    fn execute<F>(&self, cancel: &Cancellation, action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        CircuitBreakerPolicy::execute(self, cancel, action)
    }

    fn execute_void<F>(&self, cancel: &Cancellation, action: F) -> Result<(), PolicyError<E>>
    where
        F: FnMut() -> Result<(), E>,
    {
        CircuitBreakerPolicy::execute_void(self, cancel, action)
    }
}

#[cfg(test)]
mod tests;
