//! Retry policy with exponential backoff.
//!
//! Used for calls to collaborators that may be briefly unavailable, such
//! as the contract broker. Calls against the provider under verification
//! are never retried: a flaky provider is a verification failure.

use crate::PlatformError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Errors that know whether repeating the operation may succeed.
pub trait Retryable {
    /// Whether the failed operation may succeed if attempted again.
    fn is_retryable(&self) -> bool;
}

impl Retryable for PlatformError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Set max retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disable jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Retry policy for executing operations with automatic retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a retry policy with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(RetryConfig::default().with_max_retries(0))
    }

    /// Calculate the delay for a given attempt number.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay =
            self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(exponent);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);

        let final_delay = if self.config.jitter {
            // up to 25% on top
            delay_ms * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Check if an error should be retried.
    #[must_use]
    pub fn should_retry<E: Retryable>(&self, error: &E, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Execute an async operation with retries.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once all
    /// retries are exhausted.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "Retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Get the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}
