use crate::config::RetryConfig;
use crate::source::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run a request with retry and exponential backoff
///
/// Makes at most `max_attempts` attempts, the first one included. Errors
/// that cannot succeed on a retry are returned immediately.
pub async fn run_with_retry<F, Fut, T>(
    mut f: F,
    retry_config: &RetryConfig,
    what: &str,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut delay = Duration::from_millis(retry_config.initial_delay_ms);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= retry_config.max_attempts || !e.is_retryable() => return Err(e),
            Err(e) => {
                warn!("{} attempt {} failed: {}, retrying in {:?}", what, attempt, e, delay);
                sleep(delay).await;
                delay = next_delay(delay, retry_config);
                attempt += 1;
            }
        }
    }
}

/// Exponential backoff step, capped at `max_delay_ms`
pub fn next_delay(delay: Duration, retry_config: &RetryConfig) -> Duration {
    let next = delay.as_millis() as f64 * retry_config.backoff_multiplier;
    Duration::from_millis(next.min(retry_config.max_delay_ms as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig { max_attempts, initial_delay_ms: 1, max_delay_ms: 4, backoff_multiplier: 2.0 }
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig { max_attempts: 5, initial_delay_ms: 100, max_delay_ms: 300, backoff_multiplier: 2.0 };
        let second = next_delay(Duration::from_millis(100), &config);
        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(next_delay(second, &config), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = run_with_retry(
            || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::Upstream("flaky".into()))
                } else {
                    Ok(7)
                }
            },
            &fast_retry(3),
            "test",
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), FetchError> = run_with_retry(
            || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Upstream("down".into()))
            },
            &fast_retry(2),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), FetchError> = run_with_retry(
            || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Status { status: 404, url: "player/x".into() })
            },
            &fast_retry(5),
            "test",
        )
        .await;

        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_means_no_retry() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), FetchError> = run_with_retry(
            || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Upstream("flaky".into()))
            },
            &fast_retry(1),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
