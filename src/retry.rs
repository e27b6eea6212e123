//! Retry logic with exponential backoff
//!
//! Every collaborator call in a run goes through a [`RetryExecutor`]. Errors are
//! classified through [`IsRetryable`]: transient failures are retried with
//! exponential backoff (plus a little jitter), permanent failures end the call at once.
//! A run-wide [`CancellationToken`] interrupts both in-flight attempts and backoff waits.
//!
//! # Example
//!
//! ```no_run
//! use news_enrich::retry::{IsRetryable, RetryExecutor};
//! use news_enrich::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let executor = RetryExecutor::new(RetryConfig::default(), CancellationToken::new());
//! let result = executor.execute(|| async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await;
//! # let _ = result;
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{AnalysisError, Error, FetchError, RetryError, ValidationError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound for jitter, as a fraction of the base delay
const MAX_JITTER_RATIO: f64 = 0.25;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, rate limits, upstream 5xx) should return `true`.
/// Permanent failures (malformed input, rejected credentials) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Minimum wait the failing service asked for before the next attempt
    ///
    /// Honoured up to the configured `max_delay`.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::RateLimited { .. } | FetchError::Request(_) => {
                true
            }
            FetchError::Server { status, .. } => *status >= 500,
            FetchError::Unauthorized(_) | FetchError::InvalidResponse(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl IsRetryable for AnalysisError {
    fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::Transient(_))
    }
}

impl IsRetryable for ValidationError {
    fn is_retryable(&self) -> bool {
        matches!(self, ValidationError::Transient(_))
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Serialization(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Runs collaborator calls with bounded retries and cancellable backoff
#[derive(Clone, Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    cancel_token: CancellationToken,
}

impl RetryExecutor {
    /// Create an executor bound to a run's cancellation token
    pub fn new(config: RetryConfig, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            cancel_token,
        }
    }

    /// Retry configuration in use
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, fails permanently, runs out of
    /// attempts, or the run is cancelled.
    ///
    /// `max_attempts` counts every call including the first; a value of 0 is treated as 1.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsRetryable + std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            if self.cancel_token.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    tracing::debug!(attempt, "Attempt abandoned on cancellation");
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                outcome = operation() => outcome,
            };

            let error = match outcome {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::warn!(error = %error, attempt, "Operation failed with non-retryable error");
                return Err(RetryError::Permanent {
                    attempt,
                    error,
                });
            }

            if attempt >= max_attempts {
                tracing::error!(
                    error = %error,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let mut delay = self.backoff_delay(attempt);
            if let Some(requested) = error.retry_after() {
                delay = delay.max(requested.min(self.config.max_delay));
            }

            tracing::warn!(
                error = %error,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Operation failed, retrying"
            );

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    tracing::debug!(attempt, "Backoff abandoned on cancellation");
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`, then jittered.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_secs =
            self.config.initial_delay.as_secs_f64() * self.config.backoff_multiplier.powi(exponent);
        let capped_secs = if base_secs.is_finite() {
            base_secs.min(self.config.max_delay.as_secs_f64())
        } else {
            self.config.max_delay.as_secs_f64()
        };
        let delay = Duration::from_secs_f64(capped_secs.max(0.0));

        if self.config.jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `delay * 1.25`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=MAX_JITTER_RATIO);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
