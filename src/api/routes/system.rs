//! System handlers: health.

use axum::{Json, response::IntoResponse};
use serde_json::json;

/// GET /api/health - Health check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
