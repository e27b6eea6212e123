//! Route handlers for the HTTP endpoint
//!
//! - [`system`] - Health check
//! - [`analyze`] - Run streaming

use serde::Deserialize;

mod analyze;
mod system;

pub use analyze::*;
pub use system::*;

/// Query parameters for `GET /api/analyze`
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Topic to fetch; the configured default when absent
    pub topic: Option<String>,
    /// Number of articles; clamped to `1..=api.max_count`
    pub count: Option<i64>,
}
