//! Run streaming handler.

use crate::api::AppState;
use crate::error::Result;
use crate::report::{ArticleSummary, ReportBuilder};
use crate::types::{EventKind, FetchQuery, PipelineEvent};
use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;

use super::AnalyzeQuery;

/// SSE event name of the summary sent after `pipeline_completed`
pub const RESULT_EVENT: &str = "result";

/// GET /api/analyze - Start a run and stream its events
///
/// Each pipeline event becomes one SSE message whose `event` field is the
/// snake_case event kind and whose `data` is the event as JSON. A completed
/// run is followed by one `result` message carrying `{"articles": [...]}`, a
/// row per validated article. The stream ends after that (or after
/// `fetch_failed`). Closing the connection cancels the run.
pub async fn analyze_stream(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>>> {
    let query = build_query(&state, params);
    tracing::info!(topic = %query.topic, count = query.limit, "Analyze request");

    let run = state.orchestrator.start_default(query)?;

    let mut report = ReportBuilder::new();
    let sse_stream = run.into_stream().flat_map(move |event| {
        report.observe(&event);

        let mut messages = Vec::with_capacity(2);
        messages.extend(event_message(&event));
        if matches!(event.kind, EventKind::PipelineCompleted { .. }) {
            let summaries = std::mem::take(&mut report).finish().summaries();
            messages.extend(result_message(&summaries));
        }
        stream::iter(messages.into_iter().map(Ok))
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn event_message(event: &PipelineEvent) -> Option<SseEvent> {
    match serde_json::to_string(event) {
        Ok(json_data) => Some(
            SseEvent::default()
                .event(event.kind.name())
                .id(event.seq.to_string())
                .data(json_data),
        ),
        Err(e) => {
            tracing::warn!("Failed to serialize event to JSON: {}", e);
            None
        }
    }
}

fn result_message(summaries: &[ArticleSummary]) -> Option<SseEvent> {
    match serde_json::to_string(&serde_json::json!({ "articles": summaries })) {
        Ok(json_data) => Some(SseEvent::default().event(RESULT_EVENT).data(json_data)),
        Err(e) => {
            tracing::warn!("Failed to serialize run summary to JSON: {}", e);
            None
        }
    }
}

/// Apply defaults and clamp the requested count
fn build_query(state: &AppState, params: AnalyzeQuery) -> FetchQuery {
    let pipeline = &state.config.pipeline;
    let max_count = state.config.api.max_count.max(1);

    let topic = params
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| pipeline.default_topic.clone());

    let count = match params.count {
        Some(n) if n < 1 => 1,
        Some(n) => usize::try_from(n).unwrap_or(max_count).min(max_count),
        None => pipeline.default_count.min(max_count),
    };

    FetchQuery::new(topic, count)
}
