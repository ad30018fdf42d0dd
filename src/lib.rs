//! Fusebox: composable retry and circuit-breaker policies for fallible operations.
//!
//! Build a policy with [`Handle`], then run actions through it with a
//! [`Cancellation`] token. Policies are synchronous; waits and timers use
//! OS threads.

pub mod backoff;
pub mod breaker;
pub mod builder;
pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod policy;
pub mod retry;

pub use backoff::BackoffSchedule;
pub use breaker::{CircuitBreakerConfig, CircuitBreakerPolicy, CircuitState, OnBreak, OnReset};
pub use builder::{BreakerOption, Handle, RetryOption};
pub use classify::{ErrorType, FailureClassifier};
pub use config::{BackoffSettings, BreakerSettings, PolicySettings, RetrySettings};
pub use control::{CancelReason, Cancellation, Cancelled};
pub use error::PolicyError;
pub use policy::Policy;
pub use retry::{OnRetry, RetryConfig, RetryPolicy, RetryReason, ValuePredicate};
