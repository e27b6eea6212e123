//! Injected collaborator interfaces.
//!
//! The orchestrator never constructs these itself; the run invoker owns their
//! lifetime and hands them over as `Arc<dyn ...>`, which lets tests substitute
//! deterministic fakes.

use crate::error::{AnalysisError, FetchError, ValidationError};
use crate::types::{AnalysisResult, Article, FetchQuery, ValidationResult};

/// Supplies the article list for a run. Called once per run.
#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch up to `query.limit` articles for `query.topic`
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Article>, FetchError>;
}

/// Primary analysis stage (sentiment, gist, tone)
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze a single article
    async fn analyze(&self, article: &Article) -> Result<AnalysisResult, AnalysisError>;
}

/// Secondary validation stage, checking an analysis against its article
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    /// Validate `analysis` against the article it was produced from
    async fn validate(
        &self,
        analysis: &AnalysisResult,
        article: &Article,
    ) -> Result<ValidationResult, ValidationError>;
}
