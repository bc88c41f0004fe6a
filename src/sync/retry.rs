//! Timeout, retry and exponential backoff around a single upstream call

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Budget for one attempt
    pub timeout: Duration,
    /// Extra attempts after the first
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            base_delay,
        }
    }

    /// Backoff before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp)
    }
}

/// Runs an operation under a [`RetryPolicy`], honouring a cancellation token.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `operation` until it succeeds, fails permanently, or retries run out.
    ///
    /// Each attempt races the timeout; cancellation wins over both the attempt and
    /// any backoff sleep and stops further attempts.
    pub async fn call<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<SyncError>,
    {
        let attempts = self.policy.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                r = tokio::time::timeout(self.policy.timeout, operation()) => r,
            };

            let err = match outcome {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!("Succeeded on attempt {}/{}", attempt, attempts);
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => e.into(),
                Err(_) => SyncError::Timeout(self.policy.timeout),
            };

            if attempt >= attempts || !err.is_retryable() {
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "Attempt {}/{} failed: {}; retrying in {:?}",
                attempt, attempts, err, delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(20), 2, Duration::from_millis(1000))
    }

    #[test]
    fn test_delay_doubles() {
        let p = policy();
        assert_eq!(p.delay_for(1), Duration::from_millis(1000));
        assert_eq!(p.delay_for(2), Duration::from_millis(2000));
        assert_eq!(p.delay_for(3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_and_final_error() {
        let fetcher = RetryingFetcher::new(policy());
        let cancel = CancellationToken::new();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let result: SyncResult<()> = fetcher
            .call(&cancel, || {
                attempts.lock().unwrap().push(Instant::now() - start);
                async { Err(ApiError::ServerError("down".into())) }
            })
            .await;

        assert_eq!(
            result,
            Err(SyncError::Upstream(ApiError::ServerError("down".into())))
        );
        assert_eq!(
            *attempts.lock().unwrap(),
            vec![
                Duration::ZERO,
                Duration::from_millis(1000),
                Duration::from_millis(3000)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_per_attempt() {
        let fetcher = RetryingFetcher::new(RetryPolicy::new(
            Duration::from_secs(2),
            1,
            Duration::from_millis(100),
        ));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let result: SyncResult<u32> = fetcher
            .call(&cancel, || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, ApiError>(1)
            })
            .await;

        assert_eq!(result, Err(SyncError::Timeout(Duration::from_secs(2))));
        assert_eq!(Instant::now() - start, Duration::from_millis(4100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failure() {
        let fetcher = RetryingFetcher::new(policy());
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let result = fetcher
            .call(&cancel, || {
                calls += 1;
                let n = calls;
                async move {
                    if n == 1 {
                        Err(ApiError::Network("reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let fetcher = RetryingFetcher::new(policy());
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let result: SyncResult<()> = fetcher
            .call(&cancel, || {
                calls += 1;
                async { Err(ApiError::NotFound("t-1".into())) }
            })
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Upstream(ApiError::NotFound(_)))
        ));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_attempt() {
        let fetcher = RetryingFetcher::new(policy());
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result: SyncResult<u32> = fetcher
            .call(&cancel, || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ApiError>(1)
            })
            .await;

        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(Instant::now() - start, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retries() {
        let fetcher = RetryingFetcher::new(policy());
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result: SyncResult<()> = fetcher
            .call(&cancel, || {
                calls += 1;
                async { Err(ApiError::ServerError("down".into())) }
            })
            .await;

        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_calls() {
        let fetcher = RetryingFetcher::new(policy());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;

        let result: SyncResult<()> = fetcher
            .call(&cancel, || {
                calls += 1;
                async { Ok::<_, ApiError>(()) }
            })
            .await;

        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(calls, 0);
    }
}
