//! NewsAPI-backed article source
//!
//! Fetches recent articles for a topic from a NewsAPI-compatible `/v2/everything`
//! endpoint and normalizes them into [`Article`]s. HTTP failures are classified
//! into [`FetchError`] variants so the run's retry policy can tell transient
//! trouble (429, 5xx, timeouts) from permanent trouble (bad key, garbage body).

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::collaborators::ArticleSource;
use crate::config::NewsApiConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::{Article, ArticleId, FetchQuery};

/// Query used for topics without a dedicated mapping
const FALLBACK_QUERY: &str = "India politics OR India government";

/// Translate a display topic into a search expression
///
/// Unknown topics fall back to the Indian-politics query.
pub fn topic_query(topic: &str) -> &'static str {
    match topic {
        "Indian Politics" => "India politics OR India government",
        "Technology" => "technology OR tech news OR artificial intelligence",
        "Business" => "business OR economy OR market",
        "International" => "international news OR world news",
        _ => FALLBACK_QUERY,
    }
}

/// Response envelope of the search endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSource {
    #[serde(default)]
    name: Option<String>,
}

/// Article source talking to NewsAPI over HTTP
pub struct NewsApiSource {
    /// HTTP client with the configured timeout
    http_client: reqwest::Client,

    config: NewsApiConfig,
}

impl NewsApiSource {
    /// Create a source from configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: NewsApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("news-enrich/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Create a source reading the key from `NEWSAPI_KEY` when the config has none
    pub fn from_env(mut config: NewsApiConfig) -> Result<Self> {
        if config.api_key.is_none() {
            config.api_key = std::env::var("NEWSAPI_KEY").ok().filter(|k| !k.is_empty());
        }
        Self::new(config)
    }

    fn query_params(&self, query: &FetchQuery, api_key: &str) -> Vec<(&'static str, String)> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(i64::from(self.config.lookback_days));
        vec![
            ("q", topic_query(&query.topic).to_string()),
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
            ("language", self.config.language.clone()),
            ("sortBy", "publishedAt".to_string()),
            ("pageSize", query.limit.to_string()),
            ("apiKey", api_key.to_string()),
        ]
    }
}

#[async_trait]
impl ArticleSource for NewsApiSource {
    async fn fetch(&self, query: &FetchQuery) -> std::result::Result<Vec<Article>, FetchError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::Unauthorized("no API key configured".to_string()))?;

        debug!(topic = %query.topic, limit = query.limit, "Requesting articles from NewsAPI");

        let response = self
            .http_client
            .get(&self.config.base_url)
            .query(&self.query_params(query, api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, body));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        if body.status != "ok" {
            let message = body.message.unwrap_or_else(|| "Unknown error".to_string());
            warn!(status = %body.status, message = %message, "NewsAPI reported an error");
            return Err(FetchError::InvalidResponse(message));
        }

        let received = body.articles.len();
        let fetched_at = Utc::now();
        let articles: Vec<Article> = body
            .articles
            .into_iter()
            .enumerate()
            .filter_map(|(n, raw)| normalize(n, raw, fetched_at))
            .take(query.limit)
            .collect();

        info!(
            topic = %query.topic,
            received,
            kept = articles.len(),
            "Fetched articles"
        );
        Ok(articles)
    }
}

/// Map a non-success status to a fetch error
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::Unauthorized(format!("HTTP {}", status.as_u16()))
        }
        s if s.is_server_error() => FetchError::Server {
            status: s.as_u16(),
            message: body,
        },
        s => FetchError::InvalidResponse(format!("unexpected HTTP {}: {}", s.as_u16(), body)),
    }
}

/// `Retry-After` in its delta-seconds form
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Clean one raw item; items without a title or description are dropped
fn normalize(n: usize, raw: RawArticle, fetched_at: DateTime<Utc>) -> Option<Article> {
    let title = non_empty(raw.title)?;
    let description = non_empty(raw.description)?;
    let body = non_empty(raw.content).unwrap_or(description);

    let url = non_empty(raw.url);
    let id = match &url {
        Some(url) => ArticleId::new(url.clone()),
        None => ArticleId::new(format!("article-{n}")),
    };

    let published_at = raw
        .published_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fetched_at);

    let source_name = raw
        .source
        .and_then(|s| non_empty(s.name))
        .unwrap_or_else(|| "Unknown".to_string());

    Some(Article {
        id,
        title,
        source_name,
        published_at,
        body,
        url,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
