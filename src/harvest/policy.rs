//! Request pacing and retry policy
//!
//! The listings service enforces an undocumented rate limit, so the harvester
//! pauses for a long randomized interval between pages and for an even longer
//! one after a failure. Both intervals, and how waiting is performed, live
//! here so they can be swapped out without touching the harvest loop.

use crate::config::{HarvestConfig, RetryConfig};
use rand::Rng;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Performs the waits the harvester asks for
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Records every requested pause and returns immediately
///
/// Used by tests and simulations that must observe pacing without waiting.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested so far, in order
    pub fn recorded(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(duration);
        }
        std::future::ready(())
    }
}

/// Inclusive range of whole seconds to pick a pause from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayRange {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    /// Picks a uniformly random duration within the range
    pub fn sample(&self) -> Duration {
        let secs = rand::thread_rng().gen_range(self.min_secs..=self.max_secs);
        Duration::from_secs(secs)
    }

    pub fn contains(&self, duration: Duration) -> bool {
        let secs = duration.as_secs();
        duration.subsec_nanos() == 0 && secs >= self.min_secs && secs <= self.max_secs
    }
}

impl From<&HarvestConfig> for DelayRange {
    fn from(config: &HarvestConfig) -> Self {
        Self::new(config.page_delay_min_secs, config.page_delay_max_secs)
    }
}

/// How a failed page request is retried
///
/// The default mirrors a patient harvester: retry forever, waiting a random
/// 3000-3600 seconds each time. Setting `max_attempts` bounds the number of
/// consecutive attempts at a single page; a `multiplier` above 1.0 grows the
/// wait with each consecutive failure, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub backoff: DelayRange,
    pub max_attempts: Option<u32>,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            backoff: DelayRange::new(config.backoff_min_secs, config.backoff_max_secs),
            max_attempts: config.max_attempts,
            multiplier: config.multiplier,
            max_backoff: Duration::from_secs(config.effective_max_backoff_secs()),
        }
    }
}

impl RetryPolicy {
    /// Policy that gives up after `max_attempts` consecutive failures
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..Self::default()
        }
    }

    /// Returns true if another attempt is allowed after `failures` consecutive failures
    pub fn allows_retry(&self, failures: u32) -> bool {
        match self.max_attempts {
            Some(max) => failures < max,
            None => true,
        }
    }

    /// Wait before the next attempt, given `failures` consecutive failures (1-based)
    pub fn backoff(&self, failures: u32) -> Duration {
        let base = self.backoff.sample();
        let exponent = failures.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let scaled = base.as_secs_f64() * factor;

        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            // Never cap below the flat range the caller configured
            return self.max_backoff.max(Duration::from_secs(self.backoff.min_secs));
        }

        Duration::from_secs(scaled.round() as u64)
    }
}
