//! Bounded retry with exponential backoff (§4.6's "archive fetch failures
//! are retried a small bounded number of times... before the phase
//! reports `DownloadFailed`") and a circuit breaker for per-host
//! failure isolation.

use apm_core::{Error, Result};
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Which errors are worth retrying: transient network conditions, not
/// structural failures like a 404 or a checksum mismatch.
fn is_retryable(err: &Error) -> bool {
    matches!(err, Error::DownloadFailed { message } if !message.contains("checksum mismatch") && !message.contains("not found"))
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    fn build_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries as usize)
            .with_jitter()
    }
}

/// Executes a fallible operation with retry and exponential backoff.
///
/// # Errors
/// Returns the last error after all retries are exhausted.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    operation
        .retry(config.build_backoff())
        .when(|e: &Error| {
            let should_retry = is_retryable(e);
            if should_retry {
                debug!(error = %e, "retrying after error");
            }
            should_retry
        })
        .notify(|e: &Error, dur: Duration| {
            warn!(error = %e, delay = ?dur, "operation failed, retrying");
        })
        .await
}

/// Executes an operation against the primary URL, falling back to
/// mirrors in order on failure.
///
/// # Errors
/// Returns `Error::download_failed` naming every URL tried if all fail.
pub async fn with_mirrors<'b, F, T>(
    primary: &'b str,
    mirrors: &'b [String],
    config: &RetryConfig,
    operation: F,
) -> Result<T>
where
    F: Fn(&'b str) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'b>>,
{
    let all_urls: Vec<&str> = std::iter::once(primary)
        .chain(mirrors.iter().map(String::as_str))
        .collect();

    let mut errors = Vec::new();

    for (i, url) in all_urls.iter().enumerate() {
        debug!(url, attempt = i + 1, total = all_urls.len(), "trying URL");

        match with_retry(config, || operation(url)).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!(url, error = %e, "URL failed");
                errors.push(format!("{url}: {e}"));
            }
        }
    }

    Err(Error::download_failed(format!(
        "all sources failed for {primary}: {}",
        errors.join("; ")
    )))
}

/// Guards against hammering a host that is already failing.
#[derive(Debug)]
pub struct CircuitBreaker {
    failures: std::sync::atomic::AtomicU32,
    threshold: u32,
    reset_timeout: Duration,
    last_failure: Mutex<Option<std::time::Instant>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failures: std::sync::atomic::AtomicU32::new(0),
            threshold,
            reset_timeout,
            last_failure: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        let failures = self.failures.load(std::sync::atomic::Ordering::Relaxed);
        if failures < self.threshold {
            return false;
        }

        let last = self.last_failure.lock().unwrap();
        matches!(*last, Some(instant) if instant.elapsed() < self.reset_timeout)
    }

    pub fn record_success(&self) {
        self.failures.store(0, std::sync::atomic::Ordering::Relaxed);
        *self.last_failure.lock().unwrap() = None;
    }

    pub fn record_failure(&self) {
        let prev = self
            .failures
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if prev + 1 >= self.threshold {
            *self.last_failure.lock().unwrap() = Some(std::time::Instant::now());
        }
    }

    /// # Errors
    /// Returns `Error::download_failed` if the circuit is open, or the
    /// operation's own error otherwise.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.is_open() {
            return Err(Error::download_failed("circuit breaker open"));
        }

        match operation().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn retry_success() {
        let config = RetryConfig::new(3);
        let result: Result<i32> = with_retry(&config, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_eventual_success() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            jitter: 0.0,
        };

        let attempts = AtomicU32::new(0);

        let result: Result<i32> = with_retry(&config, || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt < 2 {
                    Err(Error::download_failed("transient"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn checksum_mismatch_is_not_retried() {
        let err = Error::download_failed("checksum mismatch for vim");
        assert!(!is_retryable(&err));
    }

    #[test]
    fn circuit_breaker_closed() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(10));
        assert!(!cb.is_open());
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn circuit_breaker_reset_on_success() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(10));
        for _ in 0..3 {
            cb.record_failure();
        }
        assert!(cb.is_open());
        cb.record_success();
        assert!(!cb.is_open());
    }
}
