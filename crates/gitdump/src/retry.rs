//! Bounded exponential backoff for transient failures.
//!
//! Used by the SQL store to ride out `database is locked` / `busy` errors when
//! several writers (walk fan-out and webhook deliveries) hit one SQLite file.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

/// Initial backoff before the first retry.
pub const INITIAL_BACKOFF_MS: u64 = 100;
/// Upper bound on a single backoff sleep.
pub const MAX_BACKOFF_MS: u64 = 2_000;
/// Total attempts, including the first.
pub const MAX_ATTEMPTS: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_ATTEMPTS - 1,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: false,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Run `operation`, retrying while `is_retryable` says the error is transient.
///
/// `label` names the operation in debug logs (e.g. the target name).
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    config: RetryConfig,
    mut operation: F,
    is_retryable: IsRetryable,
    label: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
    IsRetryable: Fn(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.into_backoff())
        .notify(|err, dur| {
            tracing::debug!(
                label,
                attempt = attempt.load(Ordering::SeqCst),
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
        })
        .when(is_retryable)
        .await
}
