//! Reconnect backoff.
//!
//! Used by the sync driver to space out reconnect attempts after a peer
//! disconnects, up to the configured retry ceiling.

use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self { max_attempts, initial_delay, max_delay: Duration::from_secs(60), backoff_multiplier: 2.0 }
    }
}

/// Retry an async operation with exponential backoff, up to
/// `config.max_attempts`. Returns the last error if every attempt fails.
pub async fn retry_async_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = Some(e);
                if attempt + 1 < config.max_attempts {
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        error = %last_error.as_ref().unwrap(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure"
                    );
                    sleep(delay).await;
                    delay = std::cmp::min(
                        Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier),
                        config.max_delay,
                    );
                }
            }
        }
    }

    Err(last_error.expect("loop runs at least once since max_attempts > 0"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(1));
        let result: Result<u32, &str> = retry_async_with_backoff(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_all_attempts_then_returns_last_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(1));
        let result: Result<u32, &str> = retry_async_with_backoff(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("connect refused")
        })
        .await;
        assert_eq!(result.unwrap_err(), "connect refused");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
