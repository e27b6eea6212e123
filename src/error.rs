//! Error types for news-enrich
//!
//! This module provides:
//! - The crate-level [`Error`] used by configuration, the run invoker and the HTTP layer
//! - Collaborator error types ([`FetchError`], [`AnalysisError`], [`ValidationError`]),
//!   each classified as transient or permanent through [`crate::retry::IsRetryable`]
//! - [`RetryError`], the single terminal error surfaced by the retry executor
//! - [`StageError`], the serializable failure description carried by failure events

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for news-enrich operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for news-enrich
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pipeline.concurrency")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Errors returned by an [`crate::collaborators::ArticleSource`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The request did not complete within the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The upstream service rejected the request because of rate limiting
    #[error("rate limited by article source")]
    RateLimited {
        /// Delay requested by the service before retrying, if any
        retry_after: Option<Duration>,
    },

    /// The upstream service failed (5xx)
    #[error("article source returned {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Credentials were missing or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The response could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Connection-level failure before a response was received
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_decode() {
            FetchError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Server {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Errors returned by an [`crate::collaborators::Analyzer`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// Timeout, rate limit or upstream outage
    #[error("transient analysis failure: {0}")]
    Transient(String),

    /// Malformed input, rejected credentials or an unusable response
    #[error("permanent analysis failure: {0}")]
    Permanent(String),
}

/// Errors returned by a [`crate::collaborators::Validator`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Timeout, rate limit or upstream outage
    #[error("transient validation failure: {0}")]
    Transient(String),

    /// Malformed input, rejected credentials or an unusable response
    #[error("permanent validation failure: {0}")]
    Permanent(String),
}

/// Terminal outcome of a retried operation that did not succeed
///
/// Exactly one of these is surfaced per [`crate::retry::RetryExecutor::execute`] call,
/// so callers can tell an exhausted retry budget apart from an immediate permanent failure.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a transient error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last: E,
    },

    /// An attempt failed with a non-retryable error
    #[error("permanent failure on attempt {attempt}: {error}")]
    Permanent {
        /// Attempt number (1-based) that produced the error
        attempt: u32,
        /// The permanent error
        error: E,
    },

    /// The run was cancelled while an attempt or a backoff delay was pending
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        /// Number of attempts started before cancellation
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Whether this error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => {
                *attempts
            }
            RetryError::Permanent { attempt, .. } => *attempt,
        }
    }
}

/// Why a stage gave up on an article
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Transient failures used up the retry budget
    RetriesExhausted,
    /// A non-retryable failure ended the stage immediately
    Permanent,
}

/// Serializable failure description attached to failure events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    /// Why the stage gave up
    pub cause: FailureCause,
    /// Number of attempts made
    pub attempts: u32,
    /// Rendered error message from the collaborator
    pub message: String,
}

impl StageError {
    /// Convert a terminal retry error into a stage failure.
    ///
    /// Returns `None` for cancellation, which is reported as a skip rather than a failure.
    pub fn from_retry<E: std::fmt::Display>(err: &RetryError<E>) -> Option<Self> {
        match err {
            RetryError::Exhausted { attempts, last } => Some(Self {
                cause: FailureCause::RetriesExhausted,
                attempts: *attempts,
                message: last.to_string(),
            }),
            RetryError::Permanent { attempt, error } => Some(Self {
                cause: FailureCause::Permanent,
                attempts: *attempt,
                message: error.to_string(),
            }),
            RetryError::Cancelled { .. } => None,
        }
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cause {
            FailureCause::RetriesExhausted => write!(
                f,
                "{} (gave up after {} attempts)",
                self.message, self.attempts
            ),
            FailureCause::Permanent => write!(f, "{} (permanent)", self.message),
        }
    }
}

/// JSON error body returned by the HTTP endpoint
///
/// ```json
/// {
///   "error": {
///     "code": "config_error",
///     "message": "configuration error: concurrency limit must be at least 1"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "config_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error.error_code(), error.to_string())
    }
}

/// Maps errors onto HTTP status codes and machine-readable codes
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Network(_) => 502,
            Error::Io(_) | Error::Serialization(_) | Error::ApiServerError(_) | Error::Other(_) => {
                500
            }
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}
