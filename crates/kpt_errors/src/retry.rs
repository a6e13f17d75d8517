//! Bounded exponential backoff for the repository drivers' read-side
//! retries. Write operations never go through this module: a failed write
//! surfaces immediately, naming the ref/tag that failed.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

use crate::error::{Error, ErrorKind};

/// Retry policy for a single logical read operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`-th retry (0-indexed), with full jitter
    /// applied so concurrent workers retrying the same upstream don't
    /// resynchronize on every backoff step.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.try_into().unwrap_or(i32::MAX));
        let scaled = self.base_delay.as_secs_f64() * exp;
        let capped = scaled.min(self.max_delay.as_secs_f64());
        let jittered = rand::rng().random_range(0.0..=capped);
        Duration::from_secs_f64(jittered)
    }
}

/// Retries `f` up to `config.max_attempts` times, classifying each failure
/// with `is_retryable`. A `Cancelled` error from `f` is never retried.
pub async fn retry<T, F, Fut>(
    config: RetryConfig,
    is_retryable: impl Fn(&Error) -> bool,
    mut f: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind() == ErrorKind::Cancelled => return Err(err),
            Err(err) if attempt + 1 >= config.max_attempts || !is_retryable(&err) => {
                return Err(err);
            }
            Err(_) => {
                tokio::time::sleep(config.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..Default::default()
        };

        let result = retry(config, |_| true, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::new(ErrorKind::Upstream, "transient"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: 3,
            ..Default::default()
        };

        let result: Result<(), Error> =
            retry(config, |_| true, || async { Err(Error::new(ErrorKind::Upstream, "down")) }).await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn cancelled_errors_are_never_retried() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::default();

        let result: Result<(), Error> = retry(config, |_| true, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::new(ErrorKind::Cancelled, "context done")) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
