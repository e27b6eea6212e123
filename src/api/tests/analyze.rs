use super::*;
use crate::api::routes::RESULT_EVENT;
use crate::error::FetchError;
use crate::testing::CallProbe;
use crate::types::FetchQuery;

/// Split an SSE body into (event name, JSON data) pairs
fn parse_sse(body: &[u8]) -> Vec<(String, serde_json::Value)> {
    let text = std::str::from_utf8(body).unwrap();
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str(v.trim()).unwrap());
                }
            }
            Some((name?, data?))
        })
        .collect()
}

/// The `pipeline_completed` payload from a parsed stream
fn completion(events: &[(String, serde_json::Value)]) -> &serde_json::Value {
    &events
        .iter()
        .find(|(name, _)| name == "pipeline_completed")
        .expect("stream has no pipeline_completed")
        .1
}

async fn get_events(app: Router, uri: &str) -> Vec<(String, serde_json::Value)> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(
        content_type.to_str().unwrap().starts_with("text/event-stream"),
        "unexpected content type {content_type:?}"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    parse_sse(&body)
}

#[tokio::test]
async fn test_analyze_streams_whole_run() {
    let (app, source) = test_app(
        Config::default(),
        MockSource::new(sample_articles(2)),
        MockValidator::new(),
    );

    let events = get_events(app, "/api/analyze?topic=Technology&count=2").await;

    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names.first(), Some(&"fetch_started"));
    assert_eq!(names.get(1), Some(&"fetch_completed"));
    assert_eq!(names[names.len() - 2], "pipeline_completed");
    assert_eq!(names.last(), Some(&RESULT_EVENT));
    assert_eq!(names.iter().filter(|n| **n == "validation_completed").count(), 2);

    let (pipeline_events, _) = events.split_at(events.len() - 1);
    for (i, (name, data)) in pipeline_events.iter().enumerate() {
        assert_eq!(data["type"], name.as_str());
        assert_eq!(data["seq"], i as u64);
    }
    assert_eq!(events[1].1["articles"].as_array().unwrap().len(), 2);

    let done = completion(&events);
    assert_eq!(done["succeeded"], 2);
    assert_eq!(done["total"], 2);
    assert_eq!(done["cancelled"], false);

    assert_eq!(source.queries(), vec![FetchQuery::new("Technology", 2)]);
}

#[tokio::test]
async fn test_analyze_applies_defaults_and_clamps_count() {
    let mut config = Config::default();
    config.api.max_count = 20;

    let cases = [
        ("/api/analyze", "Indian Politics", 12),
        ("/api/analyze?count=500", "Indian Politics", 20),
        ("/api/analyze?count=0", "Indian Politics", 1),
        ("/api/analyze?count=-3&topic=Business", "Business", 1),
        ("/api/analyze?topic=%20%20", "Indian Politics", 12),
    ];

    for (uri, topic, limit) in cases {
        let (app, source) = test_app(
            config.clone(),
            MockSource::new(Vec::new()),
            MockValidator::new(),
        );
        get_events(app, uri).await;
        assert_eq!(
            source.queries(),
            vec![FetchQuery::new(topic, limit)],
            "request {uri}"
        );
    }
}

#[tokio::test]
async fn test_analyze_rejects_non_numeric_count() {
    let request = Request::builder()
        .uri("/api/analyze?count=lots")
        .body(Body::empty())
        .unwrap();

    let response = default_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_reports_validation_failure() {
    let (app, _) = test_app(
        Config::default(),
        MockSource::new(sample_articles(3)),
        MockValidator::new().with("a1", crate::testing::Behavior::Permanent),
    );

    let events = get_events(app, "/api/analyze?count=3").await;

    let failed: Vec<_> = events
        .iter()
        .filter(|(n, _)| n == "validation_failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].1["article_id"], "a1");
    assert_eq!(failed[0].1["error"]["cause"], "permanent");

    let done = completion(&events);
    assert_eq!(done["succeeded"], 2);
    assert_eq!(done["failed"], 1);
}

#[tokio::test]
async fn test_analyze_ends_with_article_summaries() {
    let (app, _) = test_app(
        Config::default(),
        MockSource::new(sample_articles(3)),
        MockValidator::new().with("a1", crate::testing::Behavior::Permanent),
    );

    let events = get_events(app, "/api/analyze?count=3").await;

    let (name, result) = events.last().unwrap();
    assert_eq!(name, RESULT_EVENT);
    let rows = result["articles"].as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let mut titles: Vec<&str> = rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
    titles.sort_unstable();
    assert_eq!(titles, ["Headline a0", "Headline a2"]);
    for row in rows {
        assert_eq!(row["sentiment"], "positive");
        assert_eq!(row["validationPassed"], true);
        assert!(row["url"].as_str().unwrap().starts_with("https://example.com/a"));
        assert!(row["summary"].as_str().unwrap().starts_with("Summary of Headline"));
    }
}

#[tokio::test]
async fn test_analyze_ends_with_fetch_failure() {
    let (app, _) = test_app(
        Config::default(),
        MockSource::new(sample_articles(3))
            .failing_with(vec![FetchError::Unauthorized("bad key".to_string())]),
        MockValidator::new(),
    );

    let events = get_events(app, "/api/analyze").await;

    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["fetch_started", "fetch_failed"]);
}

#[tokio::test]
async fn test_client_disconnect_cancels_run() {
    let probe = CallProbe::new();
    let config = Config::default();
    let orchestrator = PipelineOrchestrator::new(
        config.clone(),
        Arc::new(MockSource::new(sample_articles(3))),
        Arc::new(
            MockAnalyzer::new()
                .with_default(crate::testing::Behavior::Hang)
                .with_probe(probe.clone()),
        ),
        Arc::new(MockValidator::new()),
    )
    .unwrap();
    let app = create_router(Arc::new(orchestrator), Arc::new(config));

    let request = Request::builder()
        .uri("/api/analyze?count=3")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while probe.active() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("analyzers never started");

    drop(response);

    tokio::time::timeout(Duration::from_secs(5), async {
        while probe.active() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("disconnect did not cancel in-flight analysis");
}
