//! Backoff for backend outages
//!
//! Contains RetryConfig, which controls how long recompute waits out a
//! `BackendUnavailable` store or record source before giving up. Version
//! conflicts are not retried here: they are resolved by re-reading.

use geostats_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

// ============================================================================
// Retry Configuration
// ============================================================================

/// Configuration for backend-outage retry behavior
///
/// # Example
/// ```ignore
/// let config = RetryConfig {
///     max_retries: 5,
///     base_delay_ms: 10,
///     max_delay_ms: 200,
/// };
/// let records = config.run("scan", || source.scan("Station"))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: usize,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Calculate delay for a given attempt (exponential backoff)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        // Cap the shift to prevent overflow (1 << 63 is the max for u64)
        let shift = attempt.min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Run `op`, retrying while it fails with `BackendUnavailable`
    ///
    /// Any other error is returned at once. After `max_retries` retries the
    /// last outage is returned.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Err(Error::BackendUnavailable(reason)) if attempt < self.max_retries => {
                    let delay = self.calculate_delay(attempt);
                    warn!(
                        target: "geostats::recompute",
                        op = what,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Backend unavailable, backing off"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
