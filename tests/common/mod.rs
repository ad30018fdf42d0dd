//! Shared helpers for fusebox integration tests.

#![allow(dead_code)]

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("service unavailable")]
    Unavailable,
    #[error("request timed out")]
    Timeout,
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Debug, thiserror::Error)]
#[error("quota exceeded")]
pub struct QuotaError;

#[derive(Debug, thiserror::Error)]
#[error("connection reset")]
pub struct ResetError;

/// Counts action invocations.
#[derive(Debug, Default)]
pub struct Calls(AtomicUsize);

impl Calls {
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
