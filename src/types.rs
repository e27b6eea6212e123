//! Core types for news-enrich

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Identifier of an article, unique within one run
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub String);

impl ArticleId {
    /// Create a new ArticleId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArticleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ArticleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fetched news item. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique id within the run (the article URL for HTTP sources)
    pub id: ArticleId,
    /// Headline
    pub title: String,
    /// Publisher name
    pub source_name: String,
    /// Publication time
    pub published_at: DateTime<Utc>,
    /// Article text handed to the analyzer
    pub body: String,
    /// Canonical link, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Overall sentiment assigned by the analysis stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Favourable coverage
    Positive,
    /// Unfavourable coverage
    Negative,
    /// Neither favourable nor unfavourable
    Neutral,
    /// Both favourable and unfavourable elements
    Mixed,
}

impl Sentiment {
    /// All variants, in report order
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Mixed,
    ];

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            "mixed" => Ok(Sentiment::Mixed),
            other => Err(format!("unknown sentiment: {other}")),
        }
    }
}

/// Output of the analysis stage. Immutable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Article this analysis belongs to
    pub article_id: ArticleId,
    /// Overall sentiment
    pub sentiment: Sentiment,
    /// Short summary of the article
    pub gist: String,
    /// Free-form tone label (e.g. "analytical")
    pub tone: String,
    /// Analyzer confidence, 0.0 to 1.0
    pub confidence: f32,
}

impl AnalysisResult {
    /// Build a result, clamping `confidence` into `0.0..=1.0`
    pub fn new(
        article_id: ArticleId,
        sentiment: Sentiment,
        gist: impl Into<String>,
        tone: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            article_id,
            sentiment,
            gist: gist.into(),
            tone: tone.into(),
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Verdict of the validation stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The analysis holds up
    Confirmed,
    /// The analysis is contradicted by the article
    Disputed,
    /// The validator could not decide
    Uncertain,
}

/// Output of the validation stage; the terminal artifact for an article
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Article this validation belongs to
    pub article_id: ArticleId,
    /// Validator verdict
    pub verdict: Verdict,
    /// Validator commentary
    pub notes: String,
    /// Validator confidence, 0.0 to 1.0
    pub confidence: f32,
}

impl ValidationResult {
    /// Build a result, clamping `confidence` into `0.0..=1.0`
    pub fn new(
        article_id: ArticleId,
        verdict: Verdict,
        notes: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            article_id,
            verdict,
            notes: notes.into(),
            confidence: clamp_confidence(confidence),
        }
    }

    /// Whether the validator confirmed the analysis
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Confirmed
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// What to fetch for a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchQuery {
    /// Topic name (e.g. "Technology")
    pub topic: String,
    /// Maximum number of articles to return
    pub limit: usize,
}

impl FetchQuery {
    /// Create a new query
    pub fn new(topic: impl Into<String>, limit: usize) -> Self {
        Self {
            topic: topic.into(),
            limit,
        }
    }
}

/// Article counts for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Articles that were validated
    pub succeeded: usize,
    /// Articles whose analysis or validation failed
    pub failed: usize,
    /// Articles abandoned without a stage outcome
    pub skipped: usize,
    /// Articles currently inside a pipeline
    pub in_flight: usize,
    /// Articles fetched for the run
    pub total: usize,
}

/// `ArticleSkipped` reason for a later article that repeats an earlier article's id
pub const DUPLICATE_ARTICLE_REASON: &str = "duplicate article id";

/// Event emitted during a run
///
/// `seq` increases by one for every event in delivery order, starting at 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Position in the run's event sequence
    pub seq: u64,
    /// When the event was merged into the output sequence
    pub timestamp: DateTime<Utc>,
    /// Event payload
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event payloads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The article source call is starting
    FetchStarted {
        /// Requested topic
        topic: String,
    },

    /// The article source returned
    FetchCompleted {
        /// Number of articles fetched
        count: usize,
        /// The fetched articles, in source order and including repeated ids
        #[serde(default)]
        articles: Vec<Article>,
    },

    /// The article source failed; the run ends after this event
    FetchFailed {
        /// Failure description
        error: StageError,
    },

    /// Analysis of an article is starting
    AnalysisStarted {
        /// Article id
        article_id: ArticleId,
    },

    /// Analysis of an article succeeded
    AnalysisCompleted {
        /// Article id
        article_id: ArticleId,
        /// Analyzer output
        result: AnalysisResult,
    },

    /// Analysis of an article failed; the article is finished
    AnalysisFailed {
        /// Article id
        article_id: ArticleId,
        /// Failure description
        error: StageError,
    },

    /// Validation of an article is starting
    ValidationStarted {
        /// Article id
        article_id: ArticleId,
    },

    /// Validation of an article succeeded; the article is finished
    ValidationCompleted {
        /// Article id
        article_id: ArticleId,
        /// Validator output
        result: ValidationResult,
    },

    /// Validation of an article failed; the article is finished
    ValidationFailed {
        /// Article id
        article_id: ArticleId,
        /// Failure description
        error: StageError,
    },

    /// An article was abandoned (cancellation, duplicate id, crashed task)
    ArticleSkipped {
        /// Article id
        article_id: ArticleId,
        /// Why the article was skipped
        reason: String,
    },

    /// Every article reached a terminal state; always the last event of a fetched run
    PipelineCompleted {
        /// Articles validated
        succeeded: usize,
        /// Articles whose analysis or validation failed
        failed: usize,
        /// Articles skipped
        skipped: usize,
        /// Articles fetched
        total: usize,
        /// Whether the run was cancelled
        cancelled: bool,
    },
}

impl EventKind {
    /// snake_case name of the variant, matching the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::FetchStarted { .. } => "fetch_started",
            EventKind::FetchCompleted { .. } => "fetch_completed",
            EventKind::FetchFailed { .. } => "fetch_failed",
            EventKind::AnalysisStarted { .. } => "analysis_started",
            EventKind::AnalysisCompleted { .. } => "analysis_completed",
            EventKind::AnalysisFailed { .. } => "analysis_failed",
            EventKind::ValidationStarted { .. } => "validation_started",
            EventKind::ValidationCompleted { .. } => "validation_completed",
            EventKind::ValidationFailed { .. } => "validation_failed",
            EventKind::ArticleSkipped { .. } => "article_skipped",
            EventKind::PipelineCompleted { .. } => "pipeline_completed",
        }
    }

    /// Article the event refers to, if any
    pub fn article_id(&self) -> Option<&ArticleId> {
        match self {
            EventKind::AnalysisStarted { article_id }
            | EventKind::AnalysisCompleted { article_id, .. }
            | EventKind::AnalysisFailed { article_id, .. }
            | EventKind::ValidationStarted { article_id }
            | EventKind::ValidationCompleted { article_id, .. }
            | EventKind::ValidationFailed { article_id, .. }
            | EventKind::ArticleSkipped { article_id, .. } => Some(article_id),
            EventKind::FetchStarted { .. }
            | EventKind::FetchCompleted { .. }
            | EventKind::FetchFailed { .. }
            | EventKind::PipelineCompleted { .. } => None,
        }
    }

    /// Whether this event finishes its article
    pub fn is_article_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::AnalysisFailed { .. }
                | EventKind::ValidationCompleted { .. }
                | EventKind::ValidationFailed { .. }
                | EventKind::ArticleSkipped { .. }
        )
    }

    /// Whether no further events follow this one
    pub fn is_run_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::FetchFailed { .. } | EventKind::PipelineCompleted { .. }
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_parses_case_insensitively() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!(" MIXED ".parse::<Sentiment>().unwrap(), Sentiment::Mixed);
        assert!("ecstatic".parse::<Sentiment>().is_err());
    }

    #[test]
    fn confidence_is_clamped() {
        let a = AnalysisResult::new(ArticleId::from("a"), Sentiment::Neutral, "g", "t", 1.7);
        assert_eq!(a.confidence, 1.0);
        let v = ValidationResult::new(ArticleId::from("a"), Verdict::Uncertain, "n", -0.5);
        assert_eq!(v.confidence, 0.0);
        let nan = ValidationResult::new(ArticleId::from("a"), Verdict::Uncertain, "n", f32::NAN);
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn only_confirmed_validation_passes() {
        let id = ArticleId::from("a");
        assert!(ValidationResult::new(id.clone(), Verdict::Confirmed, "", 0.9).passed());
        assert!(!ValidationResult::new(id.clone(), Verdict::Disputed, "", 0.9).passed());
        assert!(!ValidationResult::new(id, Verdict::Uncertain, "", 0.9).passed());
    }

    #[test]
    fn event_serializes_with_flattened_type_tag() {
        let event = PipelineEvent {
            seq: 7,
            timestamp: Utc::now(),
            kind: EventKind::AnalysisStarted {
                article_id: ArticleId::from("https://example.com/a"),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "analysis_started");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["article_id"], "https://example.com/a");

        let back: PipelineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn event_name_matches_serialized_tag() {
        let kinds = vec![
            EventKind::FetchCompleted {
                count: 0,
                articles: Vec::new(),
            },
            EventKind::ArticleSkipped {
                article_id: ArticleId::from("x"),
                reason: "duplicate".to_string(),
            },
            EventKind::PipelineCompleted {
                succeeded: 1,
                failed: 0,
                skipped: 0,
                total: 1,
                cancelled: false,
            },
        ];
        for kind in kinds {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json["type"], kind.name());
        }
    }

    #[test]
    fn terminal_classification() {
        let id = ArticleId::from("a");
        assert!(!EventKind::AnalysisStarted { article_id: id.clone() }.is_article_terminal());
        assert!(
            EventKind::ArticleSkipped {
                article_id: id.clone(),
                reason: String::new()
            }
            .is_article_terminal()
        );
        assert!(
            EventKind::FetchCompleted {
                count: 0,
                articles: Vec::new()
            }
            .article_id()
            .is_none()
        );
        assert_eq!(
            EventKind::ValidationStarted { article_id: id.clone() }.article_id(),
            Some(&id)
        );
        assert!(
            EventKind::PipelineCompleted {
                succeeded: 0,
                failed: 0,
                skipped: 0,
                total: 0,
                cancelled: true
            }
            .is_run_terminal()
        );
    }
}
