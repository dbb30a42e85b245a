//! Reconnection policy with exponential backoff.

use std::time::Duration;

use qmodel_core::{Error, ErrorClass};

/// Configurable retry policy.
///
/// By default only the connection family is retried; a server-raised
/// `QError` is never retried regardless of configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Error families considered retryable.
    pub retryable: Vec<ErrorClass>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            retryable: vec![ErrorClass::Connection],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn retry_on(mut self, classes: Vec<ErrorClass>) -> Self {
        self.retryable = classes;
        self
    }

    /// Delay before retrying `attempt` (0-indexed):
    /// `min(max_delay, base_delay * backoff_factor^attempt)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        self.max_delay.min(Duration::from_secs_f64(scaled))
    }

    /// Whether an error should trigger reconnect-and-retry.
    pub fn is_retryable(&self, error: &Error) -> bool {
        // A server error is an answer, not a transport failure.
        if matches!(error, Error::Q(_)) {
            return false;
        }
        self.retryable.contains(&error.class())
    }
}
