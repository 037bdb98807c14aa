//! Exponential backoff retry for store calls.
//!
//! A [`RetryPolicy`] is constructed once and injected into each store
//! client. Only transient errors are retried; everything else returns on
//! the first attempt.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Create a new policy. The maximum delay cap defaults to 5 seconds.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether the error should be retried at the given attempt number.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &StoreError) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    /// Delay before the retry following `attempt`.
    ///
    /// A `RateLimited` error with `retry_after_secs` uses that value, capped
    /// at `max_delay`. Otherwise `min(base_delay * 2^attempt, max_delay)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &StoreError) -> Duration {
        if let StoreError::RateLimited {
            retry_after_secs: Some(retry_after),
        } = error
        {
            return Duration::from_secs(*retry_after).min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Execute an async store call with retry.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation,
                            attempt = attempt + 1,
                            "Store call succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_transient() && attempt > 0 {
                            warn!(
                                operation,
                                attempts = attempt + 1,
                                error = %error,
                                "Max retries exceeded"
                            );
                            return Err(StoreError::MaxRetriesExceeded {
                                operation: operation.to_string(),
                                attempts: attempt + 1,
                                message: error.to_string(),
                            });
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying store call after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(200));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry_only_transient() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        assert!(policy.should_retry(0, &StoreError::timeout("slow")));
        assert!(policy.should_retry(2, &StoreError::unavailable("503")));
        assert!(!policy.should_retry(3, &StoreError::unavailable("503")));
        assert!(!policy.should_retry(0, &StoreError::rejected("bad")));
        assert!(!policy.should_retry(0, &StoreError::not_found("s1")));
    }

    #[test]
    fn test_delay_exponential_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let error = StoreError::connection_failed("refused");
        assert_eq!(policy.delay_for(0, &error), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, &error), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2, &error), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
        };
        let error = StoreError::timeout("slow");
        assert_eq!(policy.delay_for(6, &error), Duration::from_secs(3));
    }

    #[test]
    fn test_delay_rate_limited_with_retry_after() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let error = StoreError::RateLimited {
            retry_after_secs: Some(2),
        };
        assert_eq!(policy.delay_for(0, &error), Duration::from_secs(2));

        let error = StoreError::RateLimited {
            retry_after_secs: Some(120),
        };
        assert_eq!(policy.delay_for(0, &error), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_execute_succeeds_after_retries() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute("get_submission", move || {
                let counter = counter_clone.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StoreError::unavailable("503"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_non_transient_fails_immediately() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: StoreResult<()> = policy
            .execute("update_submission", move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::rejected("status constraint"))
                }
            })
            .await;

        assert!(matches!(result, Err(StoreError::Rejected { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_max_retries_exceeded() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: StoreResult<()> = policy
            .execute("create_or_replace", move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::timeout("10s"))
                }
            })
            .await;

        match result {
            Err(StoreError::MaxRetriesExceeded { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("Expected MaxRetriesExceeded, got: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_policy_returns_original_error() {
        let policy = RetryPolicy::none();
        let result: StoreResult<()> = policy
            .execute("list", || async { Err(StoreError::timeout("slow")) })
            .await;
        assert!(matches!(result, Err(StoreError::Timeout { .. })));
    }
}
