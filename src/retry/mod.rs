//! Retry policy.
//!
//! Runs an action again while its failures are classified as handled and
//! either the retry budget or the backoff schedule allows another attempt.
//! Each call is independent: a `RetryPolicy` holds no per-call state and can
//! be shared across threads.

mod policy;
mod run;

pub use policy::{OnRetry, RetryConfig, RetryPolicy, RetryReason, ValuePredicate, DEFAULT_RETRIES};
