//! Exponential backoff retry wrapper and request-rate limiting shared by all
//! chat providers, driven by the `TaskWingError` taxonomy's `is_transient()`.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use governor::{Quota, RateLimiter};
use governor::state::{InMemoryState, NotKeyed};
use governor::clock::DefaultClock;

use crate::domain::error::TaskWingError;

pub struct RetryPolicy {
    max_elapsed: Duration,
    initial_interval: Duration,
    max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_elapsed: Duration::from_secs(60),
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_interval: Duration, max_interval: Duration, max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            initial_interval,
            max_interval,
        }
    }

    /// Run `operation`, retrying only `TaskWingError::Transient` results with
    /// exponential backoff. Any other error returns immediately.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, TaskWingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskWingError>>,
    {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: Some(self.max_elapsed),
            ..ExponentialBackoff::default()
        };

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => match backoff.next_backoff() {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }
}

/// A token-bucket rate limiter bounding outbound requests per provider.
pub struct RequestRateLimiter {
    inner: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RequestRateLimiter {
    pub fn per_second(rate: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(rate.max(1)).unwrap());
        Self {
            inner: RateLimiter::direct(quota),
        }
    }

    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), Duration::from_secs(5));
        let calls = Arc::new(AtomicU32::new(0));
        let result = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(TaskWingError::Transient("rate limited".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = policy
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TaskWingError::Auth("bad key".to_string()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
