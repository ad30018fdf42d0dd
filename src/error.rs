//! Error taxonomy shared by all policies.

use thiserror::Error;

use crate::control::Cancelled;

/// Why a policy call did not produce a value.
///
/// `Failed` and `Exhausted` display the action's own failure unchanged, so
/// callers that only log the error see exactly what the action produced.
/// Match on the variant to choose a remediation.
#[derive(Debug, Error)]
pub enum PolicyError<E> {
    /// The action failed and the policy returned its failure as-is: the
    /// classifier did not match, or the policy never retries (circuit breaker).
    #[error("{0}")]
    Failed(E),

    /// A handled failure outlasted the retry budget and schedule.
    #[error("{failure}")]
    Exhausted {
        /// Total action invocations, including the first.
        attempts: usize,
        /// The failure from the final attempt.
        failure: E,
    },

    /// The call's cancellation token fired.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// The circuit is open; the action was not invoked.
    #[error("circuit broken")]
    CircuitBroken,
}

impl<E> PolicyError<E> {
    pub fn is_failed(&self) -> bool {
        matches!(self, PolicyError::Failed(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, PolicyError::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PolicyError::Cancelled(_))
    }

    pub fn is_circuit_broken(&self) -> bool {
        matches!(self, PolicyError::CircuitBroken)
    }

    /// The action's failure, if this error carries one.
    pub fn failure(&self) -> Option<&E> {
        match self {
            PolicyError::Failed(failure) | PolicyError::Exhausted { failure, .. } => {
                Some(failure)
            }
            PolicyError::Cancelled(_) | PolicyError::CircuitBroken => None,
        }
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            PolicyError::Failed(failure) | PolicyError::Exhausted { failure, .. } => {
                Some(failure)
            }
            PolicyError::Cancelled(_) | PolicyError::CircuitBroken => None,
        }
    }

    /// Invocations made before giving up, when known.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            PolicyError::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Map the carried failure, keeping the kind.
    pub fn map_failure<F, E2>(self, f: F) -> PolicyError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            PolicyError::Failed(failure) => PolicyError::Failed(f(failure)),
            PolicyError::Exhausted { attempts, failure } => PolicyError::Exhausted {
                attempts,
                failure: f(failure),
            },
            PolicyError::Cancelled(cancelled) => PolicyError::Cancelled(cancelled),
            PolicyError::CircuitBroken => PolicyError::CircuitBroken,
        }
    }
}
