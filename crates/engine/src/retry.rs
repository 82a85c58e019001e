//! Retry configuration for `apply()`
//!
//! A retry repeats the whole batch from a fresh transaction after a fixed
//! sleep. The interval is fixed; there is no backoff.
//!
//! # Example
//!
//! ```
//! use grantsync_engine::RetryConfig;
//! use std::time::Duration;
//!
//! let config = RetryConfig::new()
//!     .with_max_retries(5)
//!     .with_retry_interval(Duration::from_millis(250));
//! assert_eq!(config.max_attempts(), 6);
//! ```

use std::time::Duration;

/// Configuration for retrying `apply()` on lock contention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (0 = no retries)
    pub max_retries: usize,
    /// Sleep between attempts
    pub retry_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Create a RetryConfig with default values
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

    /// Set the sleep between attempts
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }
}
