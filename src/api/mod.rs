//! Streaming HTTP endpoint
//!
//! Exposes pipeline runs over HTTP: every request to `/api/analyze` starts a
//! fresh run and streams its events back as Server-Sent Events.

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::PipelineOrchestrator;
use axum::{Router, http::HeaderValue, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router
///
/// # Routes
///
/// - `GET /api/health` - Health check
/// - `GET /api/analyze?topic=&count=` - Start a run and stream its events
pub fn create_router(orchestrator: Arc<PipelineOrchestrator>, config: Arc<Config>) -> Router {
    let state = AppState::new(orchestrator, config.clone());

    let router = Router::new()
        .route("/api/health", get(routes::health_check))
        .route("/api/analyze", get(routes::analyze_stream))
        .with_state(state);

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// "*" (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    let cors = if allow_any || origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    };

    cors.allow_methods(Any).allow_headers(Any)
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails or the task is aborted.
///
/// # Example
///
/// ```no_run
/// use news_enrich::{Config, PipelineOrchestrator};
/// use news_enrich::source::NewsApiSource;
/// # use news_enrich::testing::{MockAnalyzer, MockValidator};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let source = Arc::new(NewsApiSource::from_env(config.source.clone())?);
/// # let analyzer = Arc::new(MockAnalyzer::new());
/// # let validator = Arc::new(MockValidator::new());
/// let orchestrator = Arc::new(PipelineOrchestrator::new(
///     config.clone(),
///     source,
///     analyzer,
///     validator,
/// )?);
///
/// news_enrich::api::start_api_server(orchestrator, Arc::new(config)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    orchestrator: Arc<PipelineOrchestrator>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(orchestrator, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
