//! Execution contract shared by every policy.

use crate::control::Cancellation;
use crate::error::PolicyError;

/// A resilience behaviour wrapped around a fallible action.
///
/// `T` is the action's success value. `execute_void` is available on every
/// policy regardless of `T` and never consults value predicates.
pub trait Policy<E, T = ()> {
    /// Run `action` under the policy and return its value.
    fn execute<F>(&self, cancel: &Cancellation, action: F) -> Result<T, PolicyError<E>>
    where
        F: FnMut() -> Result<T, E>;

    /// Run an action that produces no value under the policy.
    fn execute_void<F>(&self, cancel: &Cancellation, action: F) -> Result<(), PolicyError<E>>
    where
        F: FnMut() -> Result<(), E>;
}
