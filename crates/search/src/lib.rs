pub mod client;
pub mod duckduckgo;
pub mod error;
pub mod tavily;

pub use client::{SearchHit, WebSearch};
pub use duckduckgo::DuckDuckGo;
pub use error::ExpandError;
pub use tavily::Tavily;

use extract::{Extractor, Graph, Outcome, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ExpanderOptions {
    pub max_results: usize,
    /// Bound on each search attempt.
    pub search_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ExpanderOptions {
    fn default() -> Self {
        Self {
            max_results: 3,
            search_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Search the web for a topic and extract a graph from what comes back.
#[derive(Clone)]
pub struct Expander {
    search: Arc<dyn WebSearch>,
    extractor: Extractor,
    options: ExpanderOptions,
}

impl Expander {
    pub fn new(search: Arc<dyn WebSearch>, extractor: Extractor) -> Self {
        Self::with_options(search, extractor, ExpanderOptions::default())
    }

    pub fn with_options(
        search: Arc<dyn WebSearch>,
        extractor: Extractor,
        options: ExpanderOptions,
    ) -> Self {
        Self {
            search,
            extractor,
            options,
        }
    }

    /// Expand `label` (optionally qualified by `context`) into a graph. Never fails: search
    /// problems and empty result sets give an empty graph without calling the model.
    pub async fn expand(&self, label: &str, context: &str) -> Outcome {
        let query = build_query(label, context);
        info!(query = %query, provider = self.search.provider_name(), "Searching");

        let hits = match self.hits(&query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(
                    kind = %e.kind(),
                    query = %query,
                    error = %e,
                    "Search step failed, returning empty graph"
                );
                return Outcome::degraded(e.kind());
            }
        };

        let text = combine_hits(&hits);
        debug!(sources = hits.len(), length = text.len(), "Analyzing search results");
        self.extractor.extract(&text).await
    }

    /// Same pipeline with the failure kept typed. Does not log degrade events.
    pub async fn try_expand(&self, label: &str, context: &str) -> Result<Graph, ExpandError> {
        let hits = self.hits(&build_query(label, context)).await?;
        Ok(self.extractor.try_extract(&combine_hits(&hits)).await?)
    }

    async fn hits(&self, query: &str) -> Result<Vec<SearchHit>, ExpandError> {
        if query.is_empty() {
            return Err(ExpandError::NoResults);
        }

        let timeout = self.options.search_timeout;
        let max_results = self.options.max_results;
        let search = &self.search;

        let mut hits = self
            .options
            .retry
            .retry("web_search", move || async move {
                match tokio::time::timeout(timeout, search.search(query, max_results)).await {
                    Ok(Ok(hits)) => Ok(hits),
                    Ok(Err(e)) => Err(ExpandError::Search(e)),
                    Err(_) => Err(ExpandError::SearchTimeout(timeout)),
                }
            })
            .await?;

        hits.truncate(max_results);
        if hits.is_empty() {
            return Err(ExpandError::NoResults);
        }
        Ok(hits)
    }
}

/// Topic label and context joined by a space, trimmed.
pub fn build_query(label: &str, context: &str) -> String {
    format!("{} {}", label, context).trim().to_string()
}

/// Render hits as `Source: <title>\n<snippet>` blocks separated by blank lines.
pub fn combine_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("Source: {}\n{}", h.title, h.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::{DegradeKind, ExtractorOptions, TextModel};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAYLOAD: &str = r#"{"nodes":[{"id":"1","label":"Ada Lovelace","type":"Person","details":""},{"id":"2","label":"Analytical Engine","type":"Object","details":""}],"edges":[{"source":"1","target":"2","label":"wrote about","details":""}]}"#;

    struct StubSearch {
        result: Result<Vec<SearchHit>, String>,
        queries: Mutex<Vec<(String, usize)>>,
    }

    impl StubSearch {
        fn returning(hits: Vec<SearchHit>) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(hits),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(message.to_string()),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<(String, usize)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebSearch for StubSearch {
        async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
            self.queries.lock().unwrap().push((query.to_string(), max_results));
            self.result.clone().map_err(|e| anyhow::anyhow!(e))
        }

        fn provider_name(&self) -> &str {
            "stub"
        }
    }

    struct StubModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl StubModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextModel for StubModel {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn options() -> ExpanderOptions {
        ExpanderOptions {
            max_results: 3,
            search_timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(1, 1, 1),
        }
    }

    fn expander(search: Arc<StubSearch>, model: Arc<StubModel>) -> Expander {
        let extractor = Extractor::with_options(
            model,
            ExtractorOptions {
                retry: RetryPolicy::none(),
                ..ExtractorOptions::default()
            },
        );
        Expander::with_options(search, extractor, options())
    }

    fn hits() -> Vec<SearchHit> {
        vec![
            SearchHit::new("Ada Lovelace", "English mathematician."),
            SearchHit::new("Analytical Engine", "A proposed mechanical computer."),
        ]
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("Ada Lovelace", "mathematics"), "Ada Lovelace mathematics");
        assert_eq!(build_query("Ada Lovelace", ""), "Ada Lovelace");
        assert_eq!(build_query("  Ada ", " "), "Ada");
    }

    #[test]
    fn test_combine_hits() {
        assert_eq!(
            combine_hits(&hits()),
            "Source: Ada Lovelace\nEnglish mathematician.\n\nSource: Analytical Engine\nA proposed mechanical computer."
        );
        assert_eq!(combine_hits(&[]), "");
    }

    #[tokio::test]
    async fn test_expand_passes_combined_text_to_model() {
        let search = StubSearch::returning(hits());
        let model = StubModel::replying(PAYLOAD);
        let outcome = expander(search.clone(), model.clone())
            .expand("Ada Lovelace", "")
            .await;

        assert_eq!(outcome.degraded, None);
        assert_eq!(outcome.graph.nodes.len(), 2);
        assert_eq!(search.queries(), vec![("Ada Lovelace".to_string(), 3)]);

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&combine_hits(&hits())));
    }

    #[tokio::test]
    async fn test_no_results_skips_model() {
        let search = StubSearch::returning(vec![]);
        let model = StubModel::replying(PAYLOAD);
        let outcome = expander(search, model.clone()).expand("Nobody", "at all").await;

        assert_eq!(outcome, Outcome::degraded(DegradeKind::NoSearchResults));
        assert!(outcome.graph.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_failure_degrades_after_retry() {
        let search = StubSearch::failing("rate limited");
        let model = StubModel::replying(PAYLOAD);
        let outcome = expander(search.clone(), model.clone()).expand("Ada", "").await;

        assert_eq!(outcome, Outcome::degraded(DegradeKind::SearchUnavailable));
        assert_eq!(search.queries().len(), 2);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_query_does_not_search() {
        let search = StubSearch::returning(hits());
        let model = StubModel::replying(PAYLOAD);
        let err = expander(search.clone(), model).try_expand(" ", "").await.unwrap_err();

        assert!(matches!(err, ExpandError::NoResults));
        assert!(search.queries().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_kind_passes_through() {
        let search = StubSearch::returning(hits());
        let model = StubModel::replying("No graph here.");
        let expander = expander(search, model);

        let outcome = expander.expand("Ada", "").await;
        assert_eq!(outcome.degraded, Some(DegradeKind::UnrecoverableStructure));

        let err = expander.try_expand("Ada", "").await.unwrap_err();
        assert_eq!(err.kind(), DegradeKind::UnrecoverableStructure);
    }

    #[tokio::test]
    async fn test_extra_hits_are_truncated() {
        let many: Vec<_> = (0..5)
            .map(|i| SearchHit::new(format!("T{}", i), "s"))
            .collect();
        let search = StubSearch::returning(many);
        let model = StubModel::replying(PAYLOAD);
        expander(search, model.clone()).expand("x", "").await;

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Source: T2"));
        assert!(!prompts[0].contains("Source: T3"));
    }
}
