//! Retry utilities with exponential backoff
//!
//! Retry eligibility comes from the error taxonomy: only errors whose
//! [`Error::retryable`] classification is true are retried. Cancellation of
//! the request scope is observed before each attempt and during backoff
//! sleeps, so a canceled caller never waits out a full backoff schedule.
//!
//! # Examples
//!
//! ```rust,no_run
//! use durable_agent::retry::{retry_with_backoff, RetryConfig};
//! use durable_agent::RequestScope;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default()
//!     .with_max_attempts(3)
//!     .with_base_delay(Duration::from_secs(1));
//!
//! let scope = RequestScope::new();
//! let result = retry_with_backoff(config, &scope, || async {
//!     // Your async operation here
//!     Ok::<_, durable_agent::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::scope::RequestScope;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff schedule for retried operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry; later retries scale from this.
    pub base_delay: Duration,

    /// Ceiling for any single delay.
    pub max_delay: Duration,

    /// Growth factor per attempt (2.0 doubles the delay each retry).
    pub multiplier: f64,

    /// Fraction of the nominal delay used to spread attempts apart
    /// (0.0 to 1.0). Keeps a fleet of callers from retrying in lockstep.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total attempt count (including the first).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the per-attempt growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction, clamped to 0.0..=1.0.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before the retry following attempt number `attempt` (0-based),
    /// exponentially scaled, capped, and jittered around the nominal value.
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());

        let spread = capped * self.jitter;
        let offset = (rand::random::<f64>() - 0.5) * spread;
        Duration::from_secs_f64((capped + offset).max(0.0))
    }
}

/// Runs `operation`, retrying transient failures with exponential backoff.
///
/// Errors whose [`Error::retryable`] is false surface immediately. The scope
/// is checked before every attempt and interrupts backoff sleeps, reporting
/// `Canceled` (or `Timeout` for a tripped deadline).
///
/// Returns the first success, or the last error once attempts are exhausted.
pub async fn retry_with_backoff<F, Fut, T>(
    config: RetryConfig,
    scope: &RequestScope,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        scope.check()?;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.retryable() => return Err(err),
            Err(err) => {
                last_error = Some(err);

                let is_last = attempt + 1 == config.max_attempts;
                if !is_last {
                    tokio::select! {
                        _ = sleep(config.delay_for(attempt)) => {}
                        _ = scope.cancelled() => {
                            return Err(scope.check().expect_err("scope tripped"));
                        }
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::internal("retry failed with no error")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let scope = RequestScope::new();
        let result = retry_with_backoff(fast_config(), &scope, || async { Ok::<_, Error>(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let scope = RequestScope::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = retry_with_backoff(fast_config(), &scope, move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::rate_limit("slow down"))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let scope = RequestScope::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let err = retry_with_backoff(fast_config(), &scope, move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(Error::invalid_input("bad"))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let scope = RequestScope::new();
        let err = retry_with_backoff(fast_config(), &scope, || async {
            Err::<u32, _>(Error::timeout())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn test_canceled_scope_stops_retrying() {
        let scope = RequestScope::new();
        scope.cancel();
        let err = retry_with_backoff(fast_config(), &scope, || async { Ok::<_, Error>(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Canceled));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::default()
            .with_base_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(15))
            .with_multiplier(3.0)
            .with_jitter(0.0);
        assert_eq!(config.delay_for(5), Duration::from_secs(15));
    }

    #[test]
    fn test_jitter_clamped() {
        let config = RetryConfig::new().with_jitter(7.5);
        assert_eq!(config.jitter, 1.0);
    }
}
