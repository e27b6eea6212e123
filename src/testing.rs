//! Testing utilities including mock collaborators.
//!
//! These let applications (and this crate's own tests) drive the orchestrator
//! deterministically without network or model calls.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collaborators::{Analyzer, ArticleSource, Validator};
use crate::error::{AnalysisError, FetchError, ValidationError};
use crate::types::{
    AnalysisResult, Article, ArticleId, FetchQuery, Sentiment, ValidationResult, Verdict,
};

/// Scripted behavior of a mock stage for one article
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Behavior {
    /// Succeed on the first attempt
    Succeed,
    /// Fail transiently this many times, then succeed
    TransientThenSucceed(u32),
    /// Fail transiently on every attempt
    AlwaysTransient,
    /// Fail permanently on the first attempt
    Permanent,
    /// Never complete
    Hang,
}

/// Tracks how many mock calls are running at once.
///
/// Share one probe between a [`MockAnalyzer`] and a [`MockValidator`] to
/// observe system-wide concurrency.
#[derive(Debug, Default)]
pub struct CallProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CallProbe {
    /// Create a new probe
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Highest number of simultaneously active calls seen
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls currently active
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Total calls started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> ProbeGuard {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard(Arc::clone(self))
    }
}

/// Decrements the probe when a call finishes or is dropped mid-flight
struct ProbeGuard(Arc<CallProbe>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-article scripts shared by the analyzer and validator mocks
#[derive(Debug, Default)]
struct Script {
    behaviors: HashMap<ArticleId, Behavior>,
    default: Option<Behavior>,
    delay: Duration,
    attempts: Mutex<HashMap<ArticleId, u32>>,
}

impl Script {
    fn behavior(&self, id: &ArticleId) -> Behavior {
        self.behaviors
            .get(id)
            .or(self.default.as_ref())
            .cloned()
            .unwrap_or(Behavior::Succeed)
    }

    /// Record an attempt and return its 1-based number
    fn bump(&self, id: &ArticleId) -> u32 {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = attempts.entry(id.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn attempts(&self, id: &ArticleId) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    /// Wait out the configured delay and decide whether this attempt succeeds.
    ///
    /// `Err(true)` is a transient failure, `Err(false)` a permanent one.
    async fn play(&self, id: &ArticleId) -> Result<(), bool> {
        let attempt = self.bump(id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.behavior(id) {
            Behavior::Succeed => Ok(()),
            Behavior::TransientThenSucceed(n) if attempt <= n => Err(true),
            Behavior::TransientThenSucceed(_) => Ok(()),
            Behavior::AlwaysTransient => Err(true),
            Behavior::Permanent => Err(false),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

/// A mock article source returning a fixed list
pub struct MockSource {
    articles: Vec<Article>,
    failures: Vec<FetchError>,
    delay: Duration,
    calls: AtomicU32,
    queries: Mutex<Vec<FetchQuery>>,
}

impl MockSource {
    /// Source that returns `articles` on every call
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            articles,
            failures: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first calls with these errors, in order, before succeeding
    pub fn failing_with(mut self, failures: Vec<FetchError>) -> Self {
        self.failures = failures;
        self
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of fetch calls made
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received, in call order
    pub fn queries(&self) -> Vec<FetchQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ArticleSource for MockSource {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Article>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.failures.get(call) {
            Some(error) => Err(error.clone()),
            None => Ok(self.articles.clone()),
        }
    }
}

/// A mock analyzer with per-article scripted behavior
#[derive(Default)]
pub struct MockAnalyzer {
    script: Script,
    probe: Option<Arc<CallProbe>>,
}

impl MockAnalyzer {
    /// Analyzer that succeeds for every article
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behavior for one article
    pub fn with(mut self, id: impl Into<ArticleId>, behavior: Behavior) -> Self {
        self.script.behaviors.insert(id.into(), behavior);
        self
    }

    /// Behavior for articles without their own script
    pub fn with_default(mut self, behavior: Behavior) -> Self {
        self.script.default = Some(behavior);
        self
    }

    /// Wait this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = delay;
        self
    }

    /// Report calls to `probe`
    pub fn with_probe(mut self, probe: Arc<CallProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Attempts made for an article
    pub fn attempts(&self, id: &ArticleId) -> u32 {
        self.script.attempts(id)
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, article: &Article) -> Result<AnalysisResult, AnalysisError> {
        let _guard = self.probe.as_ref().map(|p| p.enter());
        match self.script.play(&article.id).await {
            Ok(()) => Ok(sample_analysis(article)),
            Err(true) => Err(AnalysisError::Transient("model rate limited".to_string())),
            Err(false) => Err(AnalysisError::Permanent("malformed article".to_string())),
        }
    }
}

/// A mock validator with per-article scripted behavior
#[derive(Default)]
pub struct MockValidator {
    script: Script,
    probe: Option<Arc<CallProbe>>,
}

impl MockValidator {
    /// Validator that confirms every analysis
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behavior for one article
    pub fn with(mut self, id: impl Into<ArticleId>, behavior: Behavior) -> Self {
        self.script.behaviors.insert(id.into(), behavior);
        self
    }

    /// Behavior for articles without their own script
    pub fn with_default(mut self, behavior: Behavior) -> Self {
        self.script.default = Some(behavior);
        self
    }

    /// Wait this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.script.delay = delay;
        self
    }

    /// Report calls to `probe`
    pub fn with_probe(mut self, probe: Arc<CallProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Attempts made for an article
    pub fn attempts(&self, id: &ArticleId) -> u32 {
        self.script.attempts(id)
    }
}

#[async_trait]
impl Validator for MockValidator {
    async fn validate(
        &self,
        analysis: &AnalysisResult,
        article: &Article,
    ) -> Result<ValidationResult, ValidationError> {
        let _guard = self.probe.as_ref().map(|p| p.enter());
        match self.script.play(&article.id).await {
            Ok(()) => Ok(ValidationResult::new(
                analysis.article_id.clone(),
                Verdict::Confirmed,
                format!("Sentiment '{}' matches the article", analysis.sentiment),
                0.8,
            )),
            Err(true) => Err(ValidationError::Transient("validator timed out".to_string())),
            Err(false) => Err(ValidationError::Permanent("credentials rejected".to_string())),
        }
    }
}

/// A deterministic article with the given id
pub fn sample_article(id: &str) -> Article {
    Article {
        id: ArticleId::from(id),
        title: format!("Headline {id}"),
        source_name: "Test News".to_string(),
        published_at: Utc
            .with_ymd_and_hms(2024, 1, 15, 10, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
        body: format!("Body of article {id}."),
        url: Some(format!("https://example.com/{id}")),
    }
}

/// `count` articles with ids `a0`, `a1`, ...
pub fn sample_articles(count: usize) -> Vec<Article> {
    (0..count).map(|i| sample_article(&format!("a{i}"))).collect()
}

/// The analysis [`MockAnalyzer`] returns for `article`
pub fn sample_analysis(article: &Article) -> AnalysisResult {
    AnalysisResult::new(
        article.id.clone(),
        Sentiment::Positive,
        format!("Summary of {}", article.title),
        "analytical",
        0.9,
    )
}
