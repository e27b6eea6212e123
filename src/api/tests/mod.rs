use super::*;
use crate::testing::{MockAnalyzer, MockSource, MockValidator, sample_articles};
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use std::time::Duration;
use tower::ServiceExt;

mod analyze;

/// Router over mock collaborators; the source is returned for inspection
fn test_app(
    config: Config,
    source: MockSource,
    validator: MockValidator,
) -> (Router, Arc<MockSource>) {
    let source = Arc::new(source);
    let orchestrator = PipelineOrchestrator::new(
        config.clone(),
        source.clone(),
        Arc::new(MockAnalyzer::new()),
        Arc::new(validator),
    )
    .unwrap();
    (
        create_router(Arc::new(orchestrator), Arc::new(config)),
        source,
    )
}

fn default_app() -> Router {
    test_app(
        Config::default(),
        MockSource::new(sample_articles(2)),
        MockValidator::new(),
    )
    .0
}

#[tokio::test]
async fn test_api_server_spawns() {
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);
    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            (*config).clone(),
            Arc::new(MockSource::new(Vec::new())),
            Arc::new(MockAnalyzer::new()),
            Arc::new(MockValidator::new()),
        )
        .unwrap(),
    );

    let api_handle = tokio::spawn(start_api_server(orchestrator, config));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server exited early");

    api_handle.abort();
}

#[tokio::test]
async fn test_health_check() {
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let response = default_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_enabled() {
    let mut config = Config::default();
    config.api.cors_origins = vec!["*".to_string()];
    let (app, _) = test_app(config, MockSource::new(Vec::new()), MockValidator::new());

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (app, _) = test_app(
        Config::default(),
        MockSource::new(Vec::new()),
        MockValidator::new(),
    );

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = Config::default();
    config.api.cors_enabled = false;
    let (app, _) = test_app(config, MockSource::new(Vec::new()), MockValidator::new());

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let request = Request::builder()
        .uri("/api/nope")
        .body(Body::empty())
        .unwrap();

    let response = default_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
