//! Application state for the API server

use crate::config::Config;
use crate::pipeline::PipelineOrchestrator;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; both fields are behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Starts one run per request
    pub orchestrator: Arc<PipelineOrchestrator>,

    /// Configuration (request limits and defaults)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, config: Arc<Config>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }
}
