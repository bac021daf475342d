//! Rate-limit retry and cooperative cancellation around a network call.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Capped exponential backoff for rate-limited requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each later one.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(60_000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after attempt number `attempt` (zero-based) was rate limited.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `op` until it succeeds, fails with a non-rate-limit error, runs out
    /// of retries, or `cancel` fires.
    ///
    /// `attempt` is the number of attempts already made for this logical call;
    /// `op` receives the number of the attempt it is making.
    pub async fn run<T, F, Fut>(
        &self,
        mut attempt: u32,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(attempt, "request cancelled before dispatch");
                return Err(ProviderError::Aborted);
            }

            let err = match op(attempt).await {
                Err(err) if err.is_retryable() => err,
                other => return other,
            };

            if attempt >= self.max_retries {
                return Err(ProviderError::RateLimited(format!(
                    "giving up after {} attempts: {err}",
                    attempt + 1
                )));
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "rate limited, backing off"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Aborted),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Race `fut` against cancellation.
pub async fn cancellable<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Aborted),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (0..8).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(
            delays,
            vec![1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000]
        );
        assert_eq!(policy.delay_for(40).as_millis(), 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_rate_limited_makes_six_attempts() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let seen = Mutex::new(Vec::new());

        let result: Result<(), _> = policy
            .run(0, &cancel, |attempt| {
                seen.lock()
                    .unwrap()
                    .push((attempt, started.elapsed().as_millis()));
                async { Err(ProviderError::RateLimited("429".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::RateLimited(_))));
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 6);
        let gaps: Vec<u128> = seen.windows(2).map(|w| w[1].1 - w[0].1).collect();
        assert_eq!(gaps, vec![1_000, 2_000, 4_000, 8_000, 16_000]);
        let attempts: Vec<u32> = seen.iter().map(|(a, _)| *a).collect();
        assert_eq!(attempts, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_attempt_is_respected() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(4, &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::RateLimited("429".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_rate_limit() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = policy
            .run(0, &cancel, |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::RateLimited("slow down".to_string()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(0, &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::ApiError {
                        status: 500,
                        message: "internal".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::ApiError { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch_makes_no_call() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(0, &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Aborted)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = policy
            .run(0, &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::RateLimited("429".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Aborted)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellable_races_future() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> =
            cancellable(&cancel, std::future::pending::<Result<(), ProviderError>>()).await;
        assert!(matches!(result, Err(ProviderError::Aborted)));
    }
}
