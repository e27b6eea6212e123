//! Run-scoped state shared between the orchestrator and its article pipelines.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::RetryConfig;
use crate::types::RunCounts;

use super::article::ArticleOutcome;

/// Settings and counters for one orchestrator invocation.
///
/// Counters are plain atomics; nothing else in a run is shared for writing.
#[derive(Debug)]
pub(crate) struct RunState {
    pub(crate) concurrency: usize,
    pub(crate) retry: RetryConfig,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    in_flight: AtomicUsize,
    total: AtomicUsize,
}

impl RunState {
    pub(crate) fn new(concurrency: usize, retry: RetryConfig) -> Self {
        Self {
            concurrency,
            retry,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn article_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Record the outcome of an article that went through a pipeline
    pub(crate) fn article_finished(&self, outcome: ArticleOutcome) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.record(outcome);
    }

    /// Record an outcome for an article that never entered a pipeline
    pub(crate) fn record(&self, outcome: ArticleOutcome) {
        let counter = match outcome {
            ArticleOutcome::Validated => &self.succeeded,
            ArticleOutcome::AnalysisFailed | ArticleOutcome::ValidationFailed => &self.failed,
            ArticleOutcome::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> RunCounts {
        RunCounts {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}
