mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, LogFormat, SearchProvider};
use extract::{Extractor, OllamaClient};
use search::{DuckDuckGo, Expander, Tavily, WebSearch};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        mode = ?config.mode,
        model = %config.model.model,
        ollama = %config.model.base_url,
        search = ?config.search.provider,
        "Starting extraction service"
    );

    let model = OllamaClient::new(config.model.base_url.clone(), config.model.model.clone())
        .with_json_mode(config.model.json_mode);
    let extractor = Extractor::with_options(Arc::new(model), config.extractor_options());

    let search: Arc<dyn WebSearch> = match config.search.provider {
        SearchProvider::DuckDuckGo => Arc::new(DuckDuckGo::new()?),
        SearchProvider::Tavily => {
            let key = config
                .search
                .tavily_api_key
                .clone()
                .context("TAVILY_API_KEY is not set")?;
            Arc::new(Tavily::new(key)?)
        }
    };
    let expander = Expander::with_options(search, extractor.clone(), config.expander_options());

    let state = routes::AppState::new(extractor, expander);
    let app = routes::router(state, &config.server)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    tracing::info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,api=debug,extract=debug,search=debug"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
