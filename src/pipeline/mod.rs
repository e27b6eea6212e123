//! Pipeline orchestration: fetch once, fan articles out over a bounded worker
//! pool, merge every pipeline's events into one ordered sequence.
//!
//! Decomposed into:
//! - [`article`] - the per-article state machine
//! - [`events`] - the event merge point
//! - `run_state` - run-scoped counters

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{Analyzer, ArticleSource, Validator};
use crate::config::Config;
use crate::error::{Error, Result, StageError};
use crate::retry::RetryExecutor;
use crate::types::{
    Article, DUPLICATE_ARTICLE_REASON, EventKind, FetchQuery, PipelineEvent, RunCounts,
};

pub mod article;
pub mod events;
mod run_state;

pub use article::{ArticleOutcome, ArticlePipeline, ArticleState, StageDeps};
pub use events::EventSink;

use run_state::RunState;

/// Owns the collaborators and starts runs.
///
/// Each call to [`PipelineOrchestrator::start`] is an independent run with its
/// own event sequence, counters and cancellation token.
pub struct PipelineOrchestrator {
    config: Arc<Config>,
    source: Arc<dyn ArticleSource>,
    analyzer: Arc<dyn Analyzer>,
    validator: Arc<dyn Validator>,
}

impl PipelineOrchestrator {
    /// Create an orchestrator after validating `config`
    pub fn new(
        config: Config,
        source: Arc<dyn ArticleSource>,
        analyzer: Arc<dyn Analyzer>,
        validator: Arc<dyn Validator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            source,
            analyzer,
            validator,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a run with the configured concurrency limit
    pub fn start_default(&self, query: FetchQuery) -> Result<PipelineRun> {
        self.start(query, self.config.pipeline.concurrency)
    }

    /// Start a run.
    ///
    /// The run's tasks are spawned on the current tokio runtime, but nothing
    /// is fetched until the returned [`PipelineRun`] is first read from
    /// ([`PipelineRun::next_event`], [`PipelineRun::collect`] or
    /// [`PipelineRun::into_stream`]). A run dropped unread never calls the
    /// source. Production pauses while the consumer is behind by more than
    /// `pipeline.event_buffer` events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `concurrency_limit` is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self, query: FetchQuery, concurrency_limit: usize) -> Result<PipelineRun> {
        if concurrency_limit == 0 {
            return Err(Error::config(
                "concurrency_limit",
                "concurrency limit must be at least 1",
            ));
        }

        let cancel_token = CancellationToken::new();
        let state = Arc::new(RunState::new(
            concurrency_limit,
            self.config.retry.clone(),
        ));
        let (sink, events, merge_handle) =
            events::spawn_merge(self.config.pipeline.event_buffer, cancel_token.clone());

        tracing::info!(
            topic = %query.topic,
            limit = query.limit,
            concurrency = concurrency_limit,
            "Starting pipeline run"
        );

        let ctx = RunContext {
            query,
            source: Arc::clone(&self.source),
            deps: StageDeps {
                analyzer: Arc::clone(&self.analyzer),
                validator: Arc::clone(&self.validator),
                retry: RetryExecutor::new(state.retry.clone(), cancel_token.child_token()),
                cancel_token: cancel_token.clone(),
            },
            sink,
            state: Arc::clone(&state),
        };
        let (start_tx, start_rx) = oneshot::channel();
        let driver = tokio::spawn(async move {
            if start_rx.await.is_err() {
                tracing::debug!(topic = %ctx.query.topic, "Run dropped before it was read");
                return;
            }
            drive_run(ctx).await;
        });

        Ok(PipelineRun {
            events,
            start: Some(start_tx),
            cancel_token,
            state,
            driver,
            merge_handle,
        })
    }
}

/// A running (or finished) pipeline run and its event sequence.
///
/// Dropping the run, or its event stream, cancels it.
pub struct PipelineRun {
    events: mpsc::Receiver<PipelineEvent>,
    start: Option<oneshot::Sender<()>>,
    cancel_token: CancellationToken,
    state: Arc<RunState>,
    driver: tokio::task::JoinHandle<()>,
    merge_handle: tokio::task::JoinHandle<()>,
}

impl PipelineRun {
    /// Next event, or `None` once the sequence has ended
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.begin();
        self.events.recv().await
    }

    /// Release the driver on first read
    fn begin(&mut self) {
        if let Some(start) = self.start.take() {
            // Err only when the driver task is already gone
            let _ = start.send(());
        }
    }

    /// Request cancellation of every in-flight article and retry wait
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// The run's cancellation token
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Live article counts
    pub fn progress(&self) -> RunCounts {
        self.state.snapshot()
    }

    /// Consume the run as a stream of events
    pub fn into_stream(mut self) -> impl Stream<Item = PipelineEvent> + Send + 'static {
        self.begin();
        tokio_stream::wrappers::ReceiverStream::new(self.events)
    }

    /// Drain the whole sequence and wait for background tasks to finish
    pub async fn collect(mut self) -> Vec<PipelineEvent> {
        self.begin();
        let mut out = Vec::new();
        while let Some(event) = self.events.recv().await {
            out.push(event);
        }
        if let Err(e) = (&mut self.driver).await {
            tracing::error!(error = %e, "Pipeline driver task failed");
        }
        if let Err(e) = (&mut self.merge_handle).await {
            tracing::error!(error = %e, "Event merge task failed");
        }
        out
    }
}

/// Everything the run driver needs, moved into its task
struct RunContext {
    query: FetchQuery,
    source: Arc<dyn ArticleSource>,
    deps: StageDeps,
    sink: EventSink,
    state: Arc<RunState>,
}

/// Top-level lifecycle of one run.
///
/// Phases:
/// 1. Fetch the article list (retried as a whole)
/// 2. Report duplicate ids as skipped
/// 3. Process the rest through the bounded pool
/// 4. Emit exactly one `PipelineCompleted`
async fn drive_run(ctx: RunContext) {
    let RunContext {
        query,
        source,
        deps,
        sink,
        state,
    } = ctx;

    // Phase 1: Fetch
    sink.emit(EventKind::FetchStarted {
        topic: query.topic.clone(),
    })
    .await;

    let articles = match deps.retry.execute(|| source.fetch(&query)).await {
        Ok(articles) => articles,
        Err(err) => match StageError::from_retry(&err) {
            Some(error) => {
                tracing::error!(topic = %query.topic, error = %error, "Fetch failed, aborting run");
                sink.emit(EventKind::FetchFailed { error }).await;
                return;
            }
            None => {
                tracing::info!(topic = %query.topic, "Run cancelled during fetch");
                finish(&sink, &state, true).await;
                return;
            }
        },
    };

    state.set_total(articles.len());
    sink.emit(EventKind::FetchCompleted {
        count: articles.len(),
        articles: articles.clone(),
    })
    .await;

    // Phase 2: Duplicate ids
    let articles = drop_duplicates(articles, &sink, &state).await;

    // Phase 3: Bounded pool
    let concurrency = state.concurrency;
    stream::iter(articles)
        .map(|article| process_article(article, deps.clone(), sink.clone(), Arc::clone(&state)))
        .buffer_unordered(concurrency)
        .collect::<Vec<()>>()
        .await;

    // Phase 4: Completion
    finish(&sink, &state, deps.cancel_token.is_cancelled()).await;
}

/// Run a single article in its own task so a panicking collaborator only
/// takes down that article.
async fn process_article(
    article: Article,
    deps: StageDeps,
    sink: EventSink,
    state: Arc<RunState>,
) {
    let article_id = article.id.clone();
    state.article_started();

    let pipeline = ArticlePipeline::new(Arc::new(article), deps, sink.clone());
    let outcome = match tokio::spawn(pipeline.run()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(article_id = %article_id, error = %e, "Article pipeline task failed");
            sink.emit(EventKind::ArticleSkipped {
                article_id,
                reason: format!("pipeline task failed: {e}"),
            })
            .await;
            ArticleOutcome::Skipped
        }
    };

    state.article_finished(outcome);
}

/// Keep the first article for each id; report later ones as skipped.
async fn drop_duplicates(
    articles: Vec<Article>,
    sink: &EventSink,
    state: &RunState,
) -> Vec<Article> {
    let mut seen = HashSet::with_capacity(articles.len());
    let mut unique = Vec::with_capacity(articles.len());

    for article in articles {
        if seen.insert(article.id.clone()) {
            unique.push(article);
        } else {
            tracing::warn!(article_id = %article.id, "Duplicate article id in fetch result");
            state.record(ArticleOutcome::Skipped);
            sink.emit(EventKind::ArticleSkipped {
                article_id: article.id,
                reason: DUPLICATE_ARTICLE_REASON.to_string(),
            })
            .await;
        }
    }

    unique
}

async fn finish(sink: &EventSink, state: &RunState, cancelled: bool) {
    let counts = state.snapshot();
    tracing::info!(
        succeeded = counts.succeeded,
        failed = counts.failed,
        skipped = counts.skipped,
        total = counts.total,
        cancelled,
        "Pipeline run finished"
    );
    sink.emit(EventKind::PipelineCompleted {
        succeeded: counts.succeeded,
        failed: counts.failed,
        skipped: counts.skipped,
        total: counts.total,
        cancelled,
    })
    .await;
}
