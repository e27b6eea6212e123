//! Run reports
//!
//! [`describe`] turns a single event into a human-readable log line, and
//! [`ReportBuilder`] folds a whole event sequence into a [`RunReport`] that can
//! be rendered as markdown, condensed into [`ArticleSummary`] rows, or saved to
//! an output directory.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, StageError};
use crate::types::{
    AnalysisResult, Article, ArticleId, DUPLICATE_ARTICLE_REASON, EventKind, PipelineEvent,
    Sentiment, ValidationResult,
};

/// File name of the markdown report written by [`RunReport::save`]
pub const REPORT_FILE: &str = "final_report.md";

/// File name of the JSON results written by [`RunReport::save`]
pub const RESULTS_FILE: &str = "validated_results.json";

/// File name of the fetched article list written by [`RunReport::save`]
pub const RAW_ARTICLES_FILE: &str = "raw_articles.json";

/// One-line description of an event, prefixed with its phase
pub fn describe(event: &PipelineEvent) -> String {
    match &event.kind {
        EventKind::FetchStarted { topic } => format!("[fetch] Fetching articles for '{topic}'"),
        EventKind::FetchCompleted { count, .. } => format!("[fetch] Retrieved {count} articles"),
        EventKind::FetchFailed { error } => format!("[fetch] Fetch failed: {error}"),
        EventKind::AnalysisStarted { article_id } => format!("[analyze] Analyzing {article_id}"),
        EventKind::AnalysisCompleted { article_id, result } => format!(
            "[analyze] {article_id}: {} ({:.0}% confidence)",
            result.sentiment,
            result.confidence * 100.0
        ),
        EventKind::AnalysisFailed { article_id, error } => {
            format!("[analyze] {article_id} failed: {error}")
        }
        EventKind::ValidationStarted { article_id } => {
            format!("[validate] Validating {article_id}")
        }
        EventKind::ValidationCompleted { article_id, result } => {
            format!("[validate] {article_id}: {:?}", result.verdict)
        }
        EventKind::ValidationFailed { article_id, error } => {
            format!("[validate] {article_id} failed: {error}")
        }
        EventKind::ArticleSkipped { article_id, reason } => {
            format!("[skip] {article_id}: {reason}")
        }
        EventKind::PipelineCompleted {
            succeeded,
            failed,
            skipped,
            total,
            cancelled,
        } => {
            let state = if *cancelled { "cancelled" } else { "complete" };
            format!(
                "[done] Pipeline {state}: {succeeded} validated, {failed} failed, {skipped} skipped of {total}"
            )
        }
    }
}

/// How an article ended up, as recorded in a report
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArticleStatus {
    /// No terminal event was seen
    Pending,
    /// Both stages succeeded
    Validated,
    /// Analysis gave up
    AnalysisFailed {
        /// Failure details
        error: StageError,
    },
    /// Validation gave up
    ValidationFailed {
        /// Failure details
        error: StageError,
    },
    /// Abandoned
    Skipped {
        /// Why the article was skipped
        reason: String,
    },
}

/// Everything a run produced for one article
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArticleReport {
    /// Article identifier
    pub article_id: ArticleId,
    /// The fetched article, when the fetch event was observed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<Article>,
    /// First-stage result, if analysis succeeded
    pub analysis: Option<AnalysisResult>,
    /// Second-stage result, if validation succeeded
    pub validation: Option<ValidationResult>,
    /// Final disposition
    pub status: ArticleStatus,
}

impl ArticleReport {
    /// Headline, falling back to the id when the article was never seen
    pub fn title(&self) -> &str {
        self.article
            .as_ref()
            .map_or(self.article_id.as_str(), |a| a.title.as_str())
    }

    /// Link to the article, or `#` when none is known
    pub fn url(&self) -> &str {
        self.article
            .as_ref()
            .and_then(|a| a.url.as_deref())
            .unwrap_or("#")
    }
}

/// Compact per-article row for UI consumers
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    /// 1-based position among validated articles
    pub id: usize,
    /// Headline
    pub title: String,
    /// Sentiment from the analysis stage
    pub sentiment: Sentiment,
    /// Whether the validator confirmed the analysis
    pub validation_passed: bool,
    /// Validator commentary
    pub validation_note: String,
    /// Analysis gist
    pub summary: String,
    /// Link to the article
    pub url: String,
}

/// Summary of a finished (or aborted) run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    /// Topic the run was started for
    pub topic: String,
    /// When the report was built
    pub generated_at: DateTime<Utc>,
    /// Articles in fetch order, then any others in the order they were first seen
    pub articles: Vec<ArticleReport>,
    /// Everything the source returned, duplicates included
    pub raw_articles: Vec<Article>,
    /// Fetch failure that aborted the run, if any
    pub fetch_error: Option<StageError>,
    /// Whether the run was cancelled
    pub cancelled: bool,
    /// Whether a completion event was seen
    pub completed: bool,
}

/// Folds an event sequence into a [`RunReport`]
#[derive(Debug, Default)]
pub struct ReportBuilder {
    topic: String,
    fetched: Vec<Article>,
    order: Vec<ArticleId>,
    entries: HashMap<ArticleId, ArticleReport>,
    fetch_error: Option<StageError>,
    cancelled: bool,
    completed: bool,
}

impl ReportBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event in
    pub fn observe(&mut self, event: &PipelineEvent) {
        match &event.kind {
            EventKind::FetchStarted { topic } => self.topic = topic.clone(),
            EventKind::FetchFailed { error } => self.fetch_error = Some(error.clone()),
            EventKind::FetchCompleted { articles, .. } => {
                self.fetched = articles.clone();
                for article in articles {
                    let entry = self.entry(&article.id);
                    if entry.article.is_none() {
                        entry.article = Some(article.clone());
                    }
                }
            }
            EventKind::AnalysisStarted { article_id }
            | EventKind::ValidationStarted { article_id } => {
                self.entry(article_id);
            }
            EventKind::AnalysisCompleted { article_id, result } => {
                self.entry(article_id).analysis = Some(result.clone());
            }
            EventKind::AnalysisFailed { article_id, error } => {
                self.entry(article_id).status = ArticleStatus::AnalysisFailed {
                    error: error.clone(),
                };
            }
            EventKind::ValidationCompleted { article_id, result } => {
                let entry = self.entry(article_id);
                entry.validation = Some(result.clone());
                entry.status = ArticleStatus::Validated;
            }
            EventKind::ValidationFailed { article_id, error } => {
                self.entry(article_id).status = ArticleStatus::ValidationFailed {
                    error: error.clone(),
                };
            }
            EventKind::ArticleSkipped { article_id, reason } => {
                let entry = self.entry(article_id);
                // Duplicates share an id with an article that is still processed
                if entry.status == ArticleStatus::Pending && reason != DUPLICATE_ARTICLE_REASON {
                    entry.status = ArticleStatus::Skipped {
                        reason: reason.clone(),
                    };
                }
            }
            EventKind::PipelineCompleted { cancelled, .. } => {
                self.cancelled = *cancelled;
                self.completed = true;
            }
        }
    }

    /// Produce the report
    pub fn finish(mut self) -> RunReport {
        let articles = self
            .order
            .iter()
            .filter_map(|id| self.entries.remove(id))
            .collect();
        RunReport {
            topic: self.topic,
            generated_at: Utc::now(),
            articles,
            raw_articles: self.fetched,
            fetch_error: self.fetch_error,
            cancelled: self.cancelled,
            completed: self.completed,
        }
    }

    fn entry(&mut self, id: &ArticleId) -> &mut ArticleReport {
        if !self.entries.contains_key(id) {
            self.order.push(id.clone());
        }
        self.entries
            .entry(id.clone())
            .or_insert_with(|| ArticleReport {
                article_id: id.clone(),
                article: None,
                analysis: None,
                validation: None,
                status: ArticleStatus::Pending,
            })
    }
}

impl FromIterator<PipelineEvent> for RunReport {
    fn from_iter<I: IntoIterator<Item = PipelineEvent>>(iter: I) -> Self {
        let mut builder = ReportBuilder::new();
        for event in iter {
            builder.observe(&event);
        }
        builder.finish()
    }
}

impl RunReport {
    /// Articles with a successful validation
    pub fn validated(&self) -> impl Iterator<Item = &ArticleReport> {
        self.articles
            .iter()
            .filter(|a| a.status == ArticleStatus::Validated)
    }

    /// One [`ArticleSummary`] per validated article, numbered from 1
    pub fn summaries(&self) -> Vec<ArticleSummary> {
        self.validated()
            .filter_map(|a| Some((a, a.analysis.as_ref()?, a.validation.as_ref()?)))
            .enumerate()
            .map(|(idx, (article, analysis, validation))| ArticleSummary {
                id: idx + 1,
                title: article.title().to_string(),
                sentiment: analysis.sentiment,
                validation_passed: validation.passed(),
                validation_note: validation.notes.clone(),
                summary: analysis.gist.clone(),
                url: article.url().to_string(),
            })
            .collect()
    }

    /// Count of analyzed articles per sentiment
    pub fn sentiment_counts(&self) -> HashMap<Sentiment, usize> {
        let mut counts: HashMap<Sentiment, usize> =
            Sentiment::ALL.iter().map(|s| (*s, 0)).collect();
        for analysis in self.articles.iter().filter_map(|a| a.analysis.as_ref()) {
            *counts.entry(analysis.sentiment).or_default() += 1;
        }
        counts
    }

    /// Render the human-readable report
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# News Analysis Report".to_string(),
            format!("**Date:** {}", self.generated_at.format("%Y-%m-%d %H:%M:%S")),
            format!("**Topic:** {}", self.topic),
            format!("**Articles Analyzed:** {}", self.articles.len()),
            "**Source:** NewsAPI".to_string(),
            String::new(),
        ];

        if let Some(error) = &self.fetch_error {
            lines.push(format!("**Fetch failed:** {error}"));
            lines.push(String::new());
        }
        if self.cancelled {
            lines.push("**Run was cancelled before all articles finished.**".to_string());
            lines.push(String::new());
        }

        lines.push("## Summary".to_string());
        lines.push(String::new());
        let counts = self.sentiment_counts();
        for sentiment in Sentiment::ALL {
            let label = sentiment.as_str();
            let mut chars = label.chars();
            let label = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            };
            lines.push(format!(
                "- {label}: {} articles",
                counts.get(&sentiment).copied().unwrap_or(0)
            ));
        }
        lines.push(String::new());

        lines.push("## Detailed Analysis".to_string());
        lines.push(String::new());
        for (idx, article) in self.validated().enumerate() {
            let (Some(analysis), Some(validation)) = (&article.analysis, &article.validation)
            else {
                continue;
            };
            let symbol = if validation.passed() { "✓" } else { "✗" };
            let url = article.url();
            lines.push(format!("### Article {}: \"{}\"", idx + 1, article.title()));
            lines.push(format!("- **Source:** [{url}]({url})"));
            if let Some(fetched) = &article.article {
                lines.push(format!("- **Publisher:** {}", fetched.source_name));
            }
            lines.push(format!("- **Gist:** {}", analysis.gist));
            lines.push(format!("- **LLM#1 Sentiment:** {}", analysis.sentiment));
            lines.push(format!(
                "- **LLM#2 Validation:** {symbol} {}",
                validation.notes
            ));
            lines.push(format!("- **Tone:** {}", analysis.tone));
            lines.push(String::new());
        }

        let failed: Vec<_> = self
            .articles
            .iter()
            .filter_map(|a| match &a.status {
                ArticleStatus::AnalysisFailed { error } => Some((a, "analysis", error)),
                ArticleStatus::ValidationFailed { error } => Some((a, "validation", error)),
                _ => None,
            })
            .collect();
        if !failed.is_empty() {
            lines.push("## Failed Articles".to_string());
            lines.push(String::new());
            for (article, stage, error) in failed {
                lines.push(format!("- {} ({stage}): {error}", article.article_id));
            }
            lines.push(String::new());
        }

        let skipped: Vec<_> = self
            .articles
            .iter()
            .filter_map(|a| match &a.status {
                ArticleStatus::Skipped { reason } => Some((a, reason)),
                _ => None,
            })
            .collect();
        if !skipped.is_empty() {
            lines.push("## Skipped Articles".to_string());
            lines.push(String::new());
            for (article, reason) in skipped {
                lines.push(format!("- {}: {reason}", article.article_id));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }

    /// Write `raw_articles.json`, `validated_results.json` and `final_report.md` into `dir`
    ///
    /// The directory is created if needed.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;

        let raw = serde_json::to_string_pretty(&self.raw_articles)?;
        tokio::fs::write(dir.join(RAW_ARTICLES_FILE), raw).await?;

        let validated: Vec<&ArticleReport> = self.validated().collect();
        let json = serde_json::to_string_pretty(&validated)?;
        tokio::fs::write(dir.join(RESULTS_FILE), json).await?;
        tokio::fs::write(dir.join(REPORT_FILE), self.to_markdown()).await?;

        tracing::info!(
            dir = %dir.display(),
            fetched = self.raw_articles.len(),
            validated = validated.len(),
            "Saved run report"
        );
        Ok(())
    }
}
