//! Configuration types for news-enrich

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

/// Top-level configuration
///
/// Every field has a default, so an empty JSON object deserializes to a usable config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool and event stream settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry behavior for every collaborator call
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP article source settings
    #[serde(default)]
    pub source: NewsApiConfig,

    /// Streaming HTTP endpoint settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.concurrency == 0 {
            return Err(Error::config(
                "pipeline.concurrency",
                "concurrency must be at least 1",
            ));
        }
        if self.pipeline.event_buffer == 0 {
            return Err(Error::config(
                "pipeline.event_buffer",
                "event buffer must hold at least one event",
            ));
        }
        if self.pipeline.default_count == 0 {
            return Err(Error::config(
                "pipeline.default_count",
                "default article count must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff multiplier must be >= 1.0",
            ));
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(Error::config(
                "retry.max_delay",
                "max_delay must not be shorter than initial_delay",
            ));
        }
        if url::Url::parse(&self.source.base_url).is_err() {
            return Err(Error::config(
                "source.base_url",
                format!("invalid URL: {}", self.source.base_url),
            ));
        }
        if self.api.max_count == 0 {
            return Err(Error::config(
                "api.max_count",
                "max_count must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Worker pool and event stream configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of articles processed at once (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Capacity of the event channel between the run and its consumer (default: 64)
    ///
    /// A full buffer stalls production rather than dropping events.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Topic used when a caller does not supply one (default: "Indian Politics")
    #[serde(default = "default_topic")]
    pub default_topic: String,

    /// Number of articles requested when a caller does not supply a count (default: 12)
    #[serde(default = "default_count")]
    pub default_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            event_buffer: default_event_buffer(),
            default_topic: default_topic(),
            default_count: default_count(),
        }
    }
}

/// Retry configuration for collaborator calls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Upper bound for a single backoff delay, before jitter (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add up to 25% random jitter to each delay (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A config that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// NewsAPI-compatible article source configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewsApiConfig {
    /// Search endpoint (default: "https://newsapi.org/v2/everything")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as the `apiKey` query parameter
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_source_timeout", with = "duration_ms_serde")]
    pub timeout: Duration,

    /// Article language filter (default: "en")
    #[serde(default = "default_language")]
    pub language: String,

    /// How many days back to search (default: 1)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout: default_source_timeout(),
            language: default_language(),
            lookback_days: default_lookback_days(),
        }
    }
}

/// Streaming HTTP endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins; "*" allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Largest article count a single request may ask for (default: 50)
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            max_count: default_max_count(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_event_buffer() -> usize {
    64
}

fn default_topic() -> String {
    "Indian Politics".to_string()
}

fn default_count() -> usize {
    12
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_base_url() -> String {
    "https://newsapi.org/v2/everything".to_string()
}

fn default_source_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_language() -> String {
    "en".to_string()
}

fn default_lookback_days() -> u32 {
    1
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_max_count() -> usize {
    50
}

// Durations are written as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
