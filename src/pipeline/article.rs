//! Per-article state machine: Fetched → Analyzing → Analyzed → Validating → Validated.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collaborators::{Analyzer, Validator};
use crate::error::{RetryError, StageError};
use crate::retry::RetryExecutor;
use crate::types::{AnalysisResult, Article, ArticleId, EventKind};

use super::events::EventSink;

/// Where an article is in its pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArticleState {
    /// Fetched, not yet started
    Fetched,
    /// Analyzer call in progress
    Analyzing,
    /// Analysis succeeded
    Analyzed,
    /// Validator call in progress
    Validating,
    /// Validation succeeded (terminal)
    Validated,
    /// Analysis gave up (terminal)
    AnalysisFailed,
    /// Validation gave up (terminal)
    ValidationFailed,
    /// Abandoned without a stage outcome (terminal)
    Skipped,
}

impl ArticleState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ArticleState::Validated
                | ArticleState::AnalysisFailed
                | ArticleState::ValidationFailed
                | ArticleState::Skipped
        )
    }

    /// Whether `self → next` is an edge of the state machine.
    ///
    /// Stages are never skipped; any non-terminal state may be abandoned.
    pub fn can_transition_to(self, next: ArticleState) -> bool {
        use ArticleState::*;
        match (self, next) {
            (Fetched, Analyzing)
            | (Analyzing, Analyzed)
            | (Analyzing, AnalysisFailed)
            | (Analyzed, Validating)
            | (Validating, Validated)
            | (Validating, ValidationFailed) => true,
            (from, Skipped) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Final disposition of an article
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArticleOutcome {
    /// Analysis and validation both succeeded
    Validated,
    /// The analysis stage gave up
    AnalysisFailed,
    /// The validation stage gave up
    ValidationFailed,
    /// Abandoned (cancellation or a crashed task)
    Skipped,
}

/// Dependencies shared by every article pipeline of a run
#[derive(Clone)]
pub struct StageDeps {
    /// Primary analysis collaborator
    pub analyzer: Arc<dyn Analyzer>,
    /// Secondary validation collaborator
    pub validator: Arc<dyn Validator>,
    /// Retry policy bound to the run's cancellation token
    pub retry: RetryExecutor,
    /// Run-wide cancellation signal
    pub cancel_token: CancellationToken,
}

/// Drives one article through analysis and validation, emitting an event at
/// every transition.
///
/// One instance per article; nothing in it is shared with other articles
/// except the collaborators, which are only read.
pub struct ArticlePipeline {
    article: Arc<Article>,
    deps: StageDeps,
    sink: EventSink,
    state: ArticleState,
}

impl ArticlePipeline {
    /// Create a pipeline for `article` in the `Fetched` state
    pub fn new(article: Arc<Article>, deps: StageDeps, sink: EventSink) -> Self {
        Self {
            article,
            deps,
            sink,
            state: ArticleState::Fetched,
        }
    }

    /// Current state
    pub fn state(&self) -> ArticleState {
        self.state
    }

    /// Run the article to a terminal state
    pub async fn run(mut self) -> ArticleOutcome {
        let article_id = self.article.id.clone();

        if self.deps.cancel_token.is_cancelled() {
            return self.skip(&article_id, "run cancelled before processing").await;
        }

        self.advance(ArticleState::Analyzing);
        self.sink
            .emit(EventKind::AnalysisStarted {
                article_id: article_id.clone(),
            })
            .await;

        let analysis = match self.analyze().await {
            Ok(analysis) => analysis,
            Err(err) => {
                let Some(error) = StageError::from_retry(&err) else {
                    return self.skip(&article_id, "run cancelled during analysis").await;
                };
                tracing::warn!(article_id = %article_id, error = %error, "Analysis failed");
                self.advance(ArticleState::AnalysisFailed);
                self.sink
                    .emit(EventKind::AnalysisFailed { article_id, error })
                    .await;
                return ArticleOutcome::AnalysisFailed;
            }
        };

        self.advance(ArticleState::Analyzed);
        self.sink
            .emit(EventKind::AnalysisCompleted {
                article_id: article_id.clone(),
                result: analysis.clone(),
            })
            .await;

        if self.deps.cancel_token.is_cancelled() {
            return self.skip(&article_id, "run cancelled before validation").await;
        }

        self.advance(ArticleState::Validating);
        self.sink
            .emit(EventKind::ValidationStarted {
                article_id: article_id.clone(),
            })
            .await;

        match self.validate(&analysis).await {
            Ok(result) => {
                self.advance(ArticleState::Validated);
                self.sink
                    .emit(EventKind::ValidationCompleted { article_id, result })
                    .await;
                ArticleOutcome::Validated
            }
            Err(err) => {
                let Some(error) = StageError::from_retry(&err) else {
                    return self.skip(&article_id, "run cancelled during validation").await;
                };
                tracing::warn!(article_id = %article_id, error = %error, "Validation failed");
                self.advance(ArticleState::ValidationFailed);
                self.sink
                    .emit(EventKind::ValidationFailed { article_id, error })
                    .await;
                ArticleOutcome::ValidationFailed
            }
        }
    }

    async fn analyze(&self) -> Result<AnalysisResult, RetryError<crate::error::AnalysisError>> {
        let analyzer = &self.deps.analyzer;
        let article = self.article.as_ref();
        self.deps
            .retry
            .execute(|| analyzer.analyze(article))
            .await
    }

    async fn validate(
        &self,
        analysis: &AnalysisResult,
    ) -> Result<crate::types::ValidationResult, RetryError<crate::error::ValidationError>> {
        let validator = &self.deps.validator;
        let article = self.article.as_ref();
        self.deps
            .retry
            .execute(|| validator.validate(analysis, article))
            .await
    }

    async fn skip(&mut self, article_id: &ArticleId, reason: &str) -> ArticleOutcome {
        tracing::info!(article_id = %article_id, reason, "Article skipped");
        self.advance(ArticleState::Skipped);
        self.sink
            .emit(EventKind::ArticleSkipped {
                article_id: article_id.clone(),
                reason: reason.to_string(),
            })
            .await;
        ArticleOutcome::Skipped
    }

    fn advance(&mut self, next: ArticleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            article_id = %self.article.id,
            from = ?self.state,
            to = ?next,
            "Article state transition"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::ArticleState::*;

    #[test]
    fn success_path_is_linear() {
        let path = [Fetched, Analyzing, Analyzed, Validating, Validated];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn stages_cannot_be_skipped() {
        assert!(!Fetched.can_transition_to(Validating));
        assert!(!Fetched.can_transition_to(Analyzed));
        assert!(!Analyzing.can_transition_to(Validating));
        assert!(!Analyzed.can_transition_to(Validated));
        assert!(!Fetched.can_transition_to(ValidationFailed));
    }

    #[test]
    fn failure_exits_come_from_their_own_stage() {
        assert!(Analyzing.can_transition_to(AnalysisFailed));
        assert!(Validating.can_transition_to(ValidationFailed));
        assert!(!Validating.can_transition_to(AnalysisFailed));
        assert!(!Analyzing.can_transition_to(ValidationFailed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            Fetched,
            Analyzing,
            Analyzed,
            Validating,
            Validated,
            AnalysisFailed,
            ValidationFailed,
            Skipped,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
        for from in all.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(Skipped));
        }
    }
}
