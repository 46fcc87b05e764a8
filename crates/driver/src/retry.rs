//! Exponential back-off shared by negotiation probing and document retries.

use std::time::Duration;

use pipeline::{DriverError, RetryPolicy};
use serde::{Deserialize, Serialize};

/// How often, and how patiently, a failed operation is retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Computes capped exponential back-off delays.
#[derive(Debug, Clone, Copy)]
pub struct Backoff;

impl Backoff {
    /// Delay before the attempt following `attempt` (0-based).
    pub fn delay(config: &RetryConfig, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = config.initial_backoff_ms as f64 * f64::from(config.backoff_multiplier).powi(exponent);
        let capped = scaled.min(config.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Decides whether `error`, raised by 0-based `attempt`, should be retried.
    ///
    /// Returns the delay to wait first, or `None` if the error is not
    /// retryable or the attempts are used up. A delay demanded by the error's
    /// policy wins over the computed back-off when it is longer.
    pub fn next_retry(config: &RetryConfig, error: &DriverError, attempt: u32) -> Option<Duration> {
        if attempt.saturating_add(1) >= config.max_attempts.max(1) {
            return None;
        }
        match error.retry_policy() {
            RetryPolicy::NonRetryable => None,
            RetryPolicy::Retryable { after } => {
                let computed = Self::delay(config, attempt);
                Some(after.map_or(computed, |after| after.max(computed)))
            }
        }
    }
}
