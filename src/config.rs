//! File-based policy settings (`policies.toml`).
//!
//! Settings only describe numbers and schedules; classifiers and callbacks
//! are code. Each section converts into builder options so a file-configured
//! policy is built the same way as a code-configured one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::BackoffSchedule;
use crate::breaker::{DEFAULT_COOL_DOWN, DEFAULT_MAX_FAILURES};
use crate::builder::{BreakerOption, RetryOption};
use crate::retry::DEFAULT_RETRIES;

/// Backoff schedule as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackoffSettings {
    /// No waiting; only the retry budget drives retries.
    None,
    /// One wait per listed delay.
    Fixed { delays_ms: Vec<u64> },
    /// The same wait for every retry.
    Constant { delay_ms: u64 },
    /// Doubling waits from `base_ms`, capped at `max_ms`, for `attempts` retries.
    Exponential {
        base_ms: u64,
        max_ms: u64,
        attempts: usize,
    },
}

impl Default for BackoffSettings {
    fn default() -> Self {
        BackoffSettings::None
    }
}

impl BackoffSettings {
    pub fn schedule(&self) -> BackoffSchedule {
        match self {
            BackoffSettings::None => BackoffSchedule::none(),
            BackoffSettings::Fixed { delays_ms } => BackoffSchedule::fixed(
                delays_ms.iter().copied().map(Duration::from_millis).collect(),
            ),
            BackoffSettings::Constant { delay_ms } => {
                BackoffSchedule::constant(Duration::from_millis(*delay_ms))
            }
            BackoffSettings::Exponential {
                base_ms,
                max_ms,
                attempts,
            } => BackoffSchedule::exponential(
                Duration::from_millis(*base_ms),
                Duration::from_millis(*max_ms),
                *attempts,
            ),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries allowed regardless of the schedule.
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default)]
    pub backoff: BackoffSettings,
}

fn default_retries() -> usize {
    DEFAULT_RETRIES
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff: BackoffSettings::default(),
        }
    }
}

impl RetrySettings {
    pub fn options<E, T>(&self) -> Vec<RetryOption<E, T>> {
        vec![
            RetryOption::Retries(self.retries),
            RetryOption::Backoff(self.backoff.schedule()),
        ]
    }
}

/// `[breaker]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive handled failures that open the circuit.
    #[serde(default = "default_max_failures")]
    pub max_failures: usize,
    /// How long the circuit stays open, in milliseconds.
    #[serde(default = "default_cool_down_ms")]
    pub cool_down_ms: u64,
}

fn default_max_failures() -> usize {
    DEFAULT_MAX_FAILURES
}

fn default_cool_down_ms() -> u64 {
    DEFAULT_COOL_DOWN.as_millis() as u64
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            cool_down_ms: default_cool_down_ms(),
        }
    }
}

impl BreakerSettings {
    pub fn options<E>(&self) -> Vec<BreakerOption<E>> {
        vec![
            BreakerOption::MaxFailures(self.max_failures),
            BreakerOption::BrokenFor(Duration::from_millis(self.cool_down_ms)),
        ]
    }
}

/// Top-level settings file. Missing sections mean "use the defaults".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default)]
    pub retry: Option<RetrySettings>,
    #[serde(default)]
    pub breaker: Option<BreakerSettings>,
}

impl PolicySettings {
    pub fn retry_options<E, T>(&self) -> Vec<RetryOption<E, T>> {
        self.retry.clone().unwrap_or_default().options()
    }

    pub fn breaker_options<E>(&self) -> Vec<BreakerOption<E>> {
        self.breaker.clone().unwrap_or_default().options()
    }
}

/// `$XDG_CONFIG_HOME/fusebox/policies.toml`.
pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fusebox")?;
    Ok(xdg_dirs.get_config_file("policies.toml"))
}

pub fn load_from_path(path: &Path) -> Result<PolicySettings> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading policy settings from {}", path.display()))?;
    let settings: PolicySettings = toml::from_str(&data)
        .with_context(|| format!("parsing policy settings in {}", path.display()))?;
    Ok(settings)
}

/// Load settings from the XDG config path, or defaults when no file exists.
pub fn load_or_default() -> Result<PolicySettings> {
    let path = config_path()?;
    if !path.exists() {
        tracing::debug!("no policy settings at {}, using defaults", path.display());
        return Ok(PolicySettings::default());
    }
    load_from_path(&path)
}
