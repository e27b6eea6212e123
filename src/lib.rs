//! # news-enrich
//!
//! Concurrent two-stage enrichment pipeline for batches of news articles.
//!
//! A run fetches a batch of articles for a topic, then pushes every article
//! through a primary analysis stage and a secondary validation stage. Articles
//! are processed independently under a bounded concurrency limit, every
//! collaborator call is retried with exponential backoff, and the whole run is
//! observable as one ordered stream of [`PipelineEvent`]s.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - Collaborators (article source, analyzer, validator) are traits
//! - **Failure isolation** - One article's failure never aborts the others
//! - **Event-driven** - Consumers read a single ordered event sequence, no polling required
//! - **Cancellable** - Dropping the consumer or cancelling the token stops all work promptly
//!
//! ## Quick Start
//!
//! ```no_run
//! use news_enrich::{Config, FetchQuery, PipelineOrchestrator};
//! use news_enrich::source::NewsApiSource;
//! # use news_enrich::testing::{MockAnalyzer, MockValidator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let source = Arc::new(NewsApiSource::from_env(config.source.clone())?);
//!     # let analyzer = Arc::new(MockAnalyzer::new());
//!     # let validator = Arc::new(MockValidator::new());
//!     let orchestrator = PipelineOrchestrator::new(config, source, analyzer, validator)?;
//!
//!     let mut run = orchestrator.start(FetchQuery::new("Technology", 12), 4)?;
//!     tokio::spawn(news_enrich::cancel_on_signal(run.cancel_token()));
//!
//!     while let Some(event) = run.next_event().await {
//!         println!("{}", news_enrich::report::describe(&event));
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Streaming HTTP endpoint
pub mod api;
/// Collaborator traits
pub mod collaborators;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Run orchestration (decomposed into focused submodules)
pub mod pipeline;
/// Run reports
pub mod report;
/// Retry logic with exponential backoff
pub mod retry;
/// NewsAPI article source
pub mod source;
/// Mock collaborators for tests and demos
pub mod testing;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use collaborators::{Analyzer, ArticleSource, Validator};
pub use config::{ApiConfig, Config, NewsApiConfig, PipelineConfig, RetryConfig};
pub use error::{
    AnalysisError, ApiError, Error, ErrorDetail, FailureCause, FetchError, Result, RetryError,
    StageError, ToHttpStatus, ValidationError,
};
pub use pipeline::{PipelineOrchestrator, PipelineRun};
pub use retry::{IsRetryable, RetryExecutor};
pub use types::{
    AnalysisResult, Article, ArticleId, EventKind, FetchQuery, PipelineEvent, RunCounts,
    Sentiment, ValidationResult, Verdict,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns early, without cancelling, if the token is cancelled by someone else first.
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = wait_for_signal() => {
            tracing::info!("Cancelling pipeline run");
            token.cancel();
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
