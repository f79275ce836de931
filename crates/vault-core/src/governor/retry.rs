//! Exponential-backoff retry loop.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Upper bound on any single wait between attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Retry schedule: `max_retries` retries after the first attempt, waiting
/// `initial_delay`, then `initial_delay * backoff_factor`, and so on, each
/// wait capped at [`MAX_RETRY_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            backoff_factor,
        }
    }

    /// Total attempts when every attempt fails: the first one plus all retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// The waits between attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_delay), move |d| Some(self.next_delay(*d)))
            .take(self.max_retries as usize)
    }

    /// The wait following `delay`. Overflowing or non-finite products saturate
    /// at [`MAX_RETRY_DELAY`].
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_factor)
            .map_or(MAX_RETRY_DELAY, |d| d.min(MAX_RETRY_DELAY))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), 1.5)
    }
}

/// Run `task`, retrying every failure according to `policy`.
///
/// After the last retry the final error is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, task: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(policy, task, |_| true).await
}

/// Run `task`, retrying only failures for which `retryable` returns `true`.
///
/// A non-retryable failure is returned immediately; a retryable one is
/// returned unchanged once the schedule is exhausted.
pub async fn with_retry_if<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut task: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 1;
    let mut delay = policy.initial_delay;
    loop {
        match task().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt <= policy.max_retries && retryable(&e) => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                if attempt <= policy.max_retries {
                    delay = policy.next_delay(delay);
                }
            }
            Err(e) => {
                if retryable(&e) {
                    warn!(attempts = attempt, error = %e, "retries exhausted");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    struct Flaky(u32);

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky failure #{}", self.0)
        }
    }

    #[test]
    fn default_schedule() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(1500),
                Duration::from_millis(2250),
            ]
        );
        assert_eq!(RetryPolicy::default().max_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fourth_attempt_after_backoff() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let result = with_retry(&RetryPolicy::default(), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= 3 {
                Err(Flaky(n))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000 + 1500 + 2250));
        assert!(elapsed < Duration::from_millis(1000 + 1500 + 2250 + 10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error_unchanged() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), Flaky> = with_retry(&RetryPolicy::default(), move || async move {
            Err(Flaky(calls.fetch_add(1, Ordering::SeqCst) + 1))
        })
        .await;
        assert_eq!(result, Err(Flaky(4)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_immediately() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), Flaky> = with_retry_if(
            &RetryPolicy::default(),
            move || async move { Err(Flaky(calls.fetch_add(1, Ordering::SeqCst) + 1)) },
            |e| e.0 != 1,
        )
        .await;
        assert_eq!(result, Err(Flaky(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::from_millis(10), 2.0);
        let result: Result<(), Flaky> = with_retry(&policy, move || async move {
            Err(Flaky(calls.fetch_add(1, Ordering::SeqCst) + 1))
        })
        .await;
        assert_eq!(result, Err(Flaky(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn huge_factor_saturates_instead_of_overflowing() {
        for factor in [1e30, f64::INFINITY, f64::NAN] {
            let policy = RetryPolicy::new(3, Duration::from_millis(1000), factor);
            let delays: Vec<_> = policy.delays().collect();
            assert_eq!(
                delays,
                vec![Duration::from_millis(1000), MAX_RETRY_DELAY, MAX_RETRY_DELAY],
                "factor {factor}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn huge_factor_still_returns_last_error() {
        let calls = &AtomicU32::new(0);
        let start = Instant::now();
        let policy = RetryPolicy::new(2, Duration::from_millis(1000), 1e30);
        let result: Result<(), Flaky> = with_retry(&policy, move || async move {
            Err(Flaky(calls.fetch_add(1, Ordering::SeqCst) + 1))
        })
        .await;
        assert_eq!(result, Err(Flaky(3)));
        assert!(start.elapsed() >= Duration::from_millis(1000) + MAX_RETRY_DELAY);
    }
}
