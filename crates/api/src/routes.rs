use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{self, AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, Instrument, Span};

use extract::{Extractor, Graph, Outcome};
use search::Expander;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{Endpoint, Metrics, MetricsSnapshot, TimedOperation};

#[derive(Clone)]
pub struct AppState {
    extractor: Extractor,
    expander: Expander,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(extractor: Extractor, expander: Expander) -> Self {
        Self {
            extractor,
            expander,
            metrics: Metrics::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ExpandRequest {
    node_label: String,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: AppState, server: &ServerConfig) -> Result<Router> {
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/analyze", post(analyze))
        .route("/expand", post(expand))
        .route("/stats", get(get_stats))
        .with_state(state)
        .layer(cors_layer(&server.cors_origins)?)
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %uuid::Uuid::new_v4(),
            )
        }));

    Ok(app)
}

/// Browser access for the configured origins. `*` opens it to any origin without
/// credentials.
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin {:?}", o))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Truth Seeker API is running",
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<Graph>, ApiError> {
    let timer = TimedOperation::start();
    let extractor = state.extractor.clone();

    let outcome = run_isolated(&state.metrics, async move { extractor.extract(&req.text).await })
        .await?;

    state.metrics.record_outcome(Endpoint::Analyze, timer.elapsed(), &outcome);
    Ok(Json(outcome.into_graph()))
}

async fn expand(
    State(state): State<AppState>,
    Json(req): Json<ExpandRequest>,
) -> Result<Json<Graph>, ApiError> {
    tracing::info!(node_label = %req.node_label, "Expanding node");
    let timer = TimedOperation::start();
    let expander = state.expander.clone();

    let outcome = run_isolated(&state.metrics, async move {
        let context = req.context.unwrap_or_default();
        expander.expand(&req.node_label, &context).await
    })
    .await?;

    state.metrics.record_outcome(Endpoint::Expand, timer.elapsed(), &outcome);
    Ok(Json(outcome.into_graph()))
}

async fn get_stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Run a pipeline call on its own task. A panic there becomes an HTTP 500 instead of taking
/// the connection down.
async fn run_isolated<F>(metrics: &Metrics, pipeline: F) -> Result<Outcome, ApiError>
where
    F: Future<Output = Outcome> + Send + 'static,
{
    tokio::spawn(pipeline.instrument(Span::current()))
        .await
        .map_err(|e| {
            metrics.record_failure();
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            error!(error = %message, "Request task failed");
            ApiError::Internal(message)
        })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "request task panicked".to_string()
    }
}
