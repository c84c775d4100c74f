//! Bounded fixed-delay retry policy
//!
//! Every "try N times, wait D between attempts" loop in the bot goes through
//! [`retry_fixed`], which drives a [`FixedRetry`] schedule with
//! `backoff::future::retry`. Retryable errors are transient; anything else
//! stops the loop on the first occurrence.

use backoff::backoff::Backoff;
use backoff::future::retry;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Fixed delay between attempts, bounded total attempt count
#[derive(Debug, Clone)]
pub struct FixedRetry {
    max_attempts: u32,
    delay: Duration,
    failures: u32,
}

impl FixedRetry {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            failures: 0,
        }
    }

    pub fn from_millis(max_attempts: u32, delay_ms: u64) -> Self {
        Self::new(max_attempts, Duration::from_millis(delay_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Backoff for FixedRetry {
    fn reset(&mut self) {
        self.failures = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.max_attempts {
            None
        } else {
            Some(self.delay)
        }
    }
}

/// Run `op` under `policy`, retrying only errors that are retryable
pub async fn retry_fixed<T, F, Fut>(policy: FixedRetry, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry(policy, || {
        let attempt = op();
        async move {
            attempt.await.map_err(|e| {
                if e.is_retryable() {
                    debug!("{} failed, will retry: {}", what, e);
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}

/// Same as [`retry_fixed`] but swallows the final error
pub async fn retry_fixed_opt<T, F, Fut>(policy: FixedRetry, what: &str, op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match retry_fixed(policy, what, op).await {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("{} gave up: {}", what, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_schedule_is_bounded() {
        let mut policy = FixedRetry::from_millis(3, 10);
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_backoff(), None);

        policy.reset();
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_zero_attempts_means_single_try() {
        let mut policy = FixedRetry::from_millis(0, 10);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.next_backoff(), None);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_fixed(FixedRetry::from_millis(5, 1), "flaky", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::Rpc("connection reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Option<()> = retry_fixed_opt(FixedRetry::from_millis(4, 1), "dead", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Http("503".into()))
            }
        })
        .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry_fixed(FixedRetry::from_millis(10, 1), "decode", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::AccountDecode("short".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::AccountDecode(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
