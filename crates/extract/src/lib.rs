pub mod error;
pub mod literal;
pub mod llm;
pub mod prompt;
pub mod recovery;
pub mod retry;
pub mod schema;

pub use error::{DegradeKind, ExtractError};
pub use llm::{OllamaClient, TextModel};
pub use retry::RetryPolicy;
pub use schema::{Edge, Graph, Node};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How much raw model output goes into degrade logs.
pub const LOG_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Bound on each model call attempt.
    pub model_timeout: Duration,
    pub retry: RetryPolicy,
    /// Remove edges whose endpoints are not node ids. Off by default.
    pub drop_dangling_edges: bool,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            drop_dangling_edges: false,
        }
    }
}

/// Result of a pipeline run that cannot fail: a graph, plus the reason it is empty when the
/// run degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub graph: Graph,
    pub degraded: Option<DegradeKind>,
}

impl Outcome {
    pub fn ok(graph: Graph) -> Self {
        Self { graph, degraded: None }
    }

    pub fn degraded(kind: DegradeKind) -> Self {
        Self {
            graph: Graph::empty(),
            degraded: Some(kind),
        }
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }
}

/// Prompt, invoke the model, recover a graph.
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn TextModel>,
    options: ExtractorOptions,
}

impl Extractor {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self::with_options(model, ExtractorOptions::default())
    }

    pub fn with_options(model: Arc<dyn TextModel>, options: ExtractorOptions) -> Self {
        Self { model, options }
    }

    /// Extract a graph from `text`. Every failure is logged and becomes an empty graph.
    pub async fn extract(&self, text: &str) -> Outcome {
        if text.trim().is_empty() {
            debug!("Empty input text, skipping model call");
            return Outcome::ok(Graph::empty());
        }

        let started = Instant::now();
        let prompt = prompt::build_extraction_prompt(text);

        let raw = match self.invoke(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    kind = %e.kind(),
                    model = self.model.model_name(),
                    error = %e,
                    "Model invocation failed, returning empty graph"
                );
                return Outcome::degraded(e.kind());
            }
        };

        match self.recover(&raw) {
            Ok(graph) => {
                info!(
                    model = self.model.model_name(),
                    nodes = graph.nodes.len(),
                    edges = graph.edges.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Extraction complete"
                );
                Outcome::ok(graph)
            }
            Err(e) => {
                warn!(
                    kind = %e.kind(),
                    error = %e,
                    raw_output = %preview(&raw, LOG_PREVIEW_CHARS),
                    "Could not recover graph from model output, returning empty graph"
                );
                Outcome::degraded(e.kind())
            }
        }
    }

    /// Same pipeline with the failure kept typed. Does not log degrade events.
    pub async fn try_extract(&self, text: &str) -> Result<Graph, ExtractError> {
        if text.trim().is_empty() {
            return Ok(Graph::empty());
        }
        let raw = self.invoke(&prompt::build_extraction_prompt(text)).await?;
        self.recover(&raw)
    }

    async fn invoke(&self, prompt: &str) -> Result<String, ExtractError> {
        let timeout = self.options.model_timeout;
        let model = &self.model;

        self.options
            .retry
            .retry("model_invocation", move || async move {
                match tokio::time::timeout(timeout, model.complete(prompt)).await {
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(e)) => Err(ExtractError::ModelInvocation(e)),
                    Err(_) => Err(ExtractError::Timeout(timeout)),
                }
            })
            .await
    }

    fn recover(&self, raw: &str) -> Result<Graph, ExtractError> {
        let mut graph = recovery::recover_graph(raw)?;

        let dangling = graph.dangling_edges().len();
        if dangling > 0 {
            if self.options.drop_dangling_edges {
                let removed = graph.retain_connected_edges();
                debug!(removed, "Dropped edges referencing unknown nodes");
            } else {
                debug!(dangling, "Graph has edges referencing unknown nodes");
            }
        }

        Ok(graph)
    }
}

/// First `max_chars` characters of `text`, marked when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
