//! Failure classification: decide whether a policy cares about a failure.
//!
//! A classifier is a cheap, side-effect-free predicate. Classifiers compose
//! with `or`; checks run left to right and stop at the first match.

use std::error::Error;
use std::fmt;
use std::mem::{discriminant, Discriminant};
use std::sync::Arc;

type Check<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Predicate over a failure answering "does this policy handle it?".
///
/// Cloning is cheap; all clones share the same checks.
pub struct FailureClassifier<E> {
    checks: Vec<Check<E>>,
}

impl<E> Clone for FailureClassifier<E> {
    fn clone(&self) -> Self {
        Self {
            checks: self.checks.clone(),
        }
    }
}

impl<E> fmt::Debug for FailureClassifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureClassifier")
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl<E> Default for FailureClassifier<E> {
    fn default() -> Self {
        Self::all()
    }
}

impl<E> FailureClassifier<E> {
    /// Handle every failure.
    pub fn all() -> Self {
        Self::when(|_| true)
    }

    /// Handle failures for which `check` returns true.
    pub fn when<F>(check: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            checks: vec![Arc::new(check)],
        }
    }

    /// Handle failures of the same enum variant as `sample`.
    ///
    /// Only the variant is compared, never the payload, so
    /// `kind_of(&MyError::Http(0))` matches every `MyError::Http(_)`.
    pub fn kind_of(sample: &E) -> Self
    where
        E: 'static,
    {
        let wanted: Discriminant<E> = discriminant(sample);
        Self::when(move |failure| discriminant(failure) == wanted)
    }

    /// Handle a failure if either this classifier or `other` does.
    pub fn or(mut self, other: FailureClassifier<E>) -> Self {
        self.checks.extend(other.checks);
        self
    }

    pub fn or_when<F>(self, check: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.or(Self::when(check))
    }

    pub fn or_kind_of(self, sample: &E) -> Self
    where
        E: 'static,
    {
        self.or(Self::kind_of(sample))
    }

    /// Whether `failure` is handled. An unmatched failure is simply not handled.
    pub fn handles(&self, failure: &E) -> bool {
        self.checks.iter().any(|check| check(failure))
    }
}

/// Capability to ask a type-erased error for its concrete type.
///
/// Implemented for the boxed and `anyhow` error carriers so policies over
/// them can match by concrete error type without reflection.
pub trait ErrorType {
    fn is_type<T>(&self) -> bool
    where
        T: Error + Send + Sync + 'static;
}

impl ErrorType for Box<dyn Error + Send + Sync> {
    fn is_type<T>(&self) -> bool
    where
        T: Error + Send + Sync + 'static,
    {
        self.is::<T>()
    }
}

impl ErrorType for anyhow::Error {
    fn is_type<T>(&self) -> bool
    where
        T: Error + Send + Sync + 'static,
    {
        self.is::<T>()
    }
}

impl<E: ErrorType> FailureClassifier<E> {
    /// Handle failures whose concrete type is `T`.
    pub fn of_type<T>() -> Self
    where
        T: Error + Send + Sync + 'static,
    {
        Self::when(|failure: &E| failure.is_type::<T>())
    }

    pub fn or_type<T>(self) -> Self
    where
        T: Error + Send + Sync + 'static,
    {
        self.or(Self::of_type::<T>())
    }
}
