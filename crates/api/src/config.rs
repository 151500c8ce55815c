use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use extract::{ExtractorOptions, RetryPolicy};
use search::ExpanderOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub search: SearchConfig,
    pub retry: RetryConfig,
    pub drop_dangling_edges: bool,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // Short timeouts, no retries
    Accurate,  // Long timeouts, more retries
    Balanced,  // Default
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub json_mode: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    DuckDuckGo,
    Tavily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub provider: SearchProvider,
    #[serde(skip_serializing)]
    pub tavily_api_key: Option<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            server: ServerConfig {
                bind_addr: "0.0.0.0:8000".to_string(),
                cors_origins: vec!["http://localhost:5173".to_string()],
            },
            model: ModelConfig {
                base_url: extract::llm::DEFAULT_BASE_URL.to_string(),
                model: extract::llm::DEFAULT_MODEL.to_string(),
                json_mode: false,
                timeout_secs: 30,
            },
            search: SearchConfig {
                provider: SearchProvider::DuckDuckGo,
                tavily_api_key: None,
                max_results: 3,
                timeout_secs: 5,
            },
            retry: RetryConfig {
                max_retries: 1,
                initial_backoff_ms: 250,
                max_backoff_ms: 2000,
            },
            drop_dangling_edges: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    pub fn fast_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Fast;
        config.model.timeout_secs = 15;
        config.search.timeout_secs = 3;
        config.retry = RetryConfig {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        };
        config
    }

    pub fn accurate_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Accurate;
        config.model.timeout_secs = 60;
        config.search.timeout_secs = 10;
        config.retry = RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        };
        config
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv_loaded(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `APP_MODE`'s preset, overridden by individual keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = match get("APP_MODE") {
            Some(v) => parse_mode(&v)?,
            None => OperationMode::Balanced,
        };
        let mut config = Self::for_mode(mode);

        if let Some(v) = get("BIND_ADDR") {
            config.server.bind_addr = v;
        }
        if let Some(v) = get("CORS_ORIGINS") {
            config.server.cors_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            config.model.base_url = v;
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            config.model.model = v;
        }
        if let Some(v) = get("OLLAMA_JSON_MODE") {
            config.model.json_mode = parse_value("OLLAMA_JSON_MODE", &v)?;
        }
        if let Some(v) = get("MODEL_TIMEOUT_SECS") {
            config.model.timeout_secs = parse_value("MODEL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("SEARCH_PROVIDER") {
            config.search.provider = parse_provider(&v)?;
        }
        config.search.tavily_api_key = get("TAVILY_API_KEY");
        if let Some(v) = get("SEARCH_MAX_RESULTS") {
            config.search.max_results = parse_value("SEARCH_MAX_RESULTS", &v)?;
        }
        if let Some(v) = get("SEARCH_TIMEOUT_SECS") {
            config.search.timeout_secs = parse_value("SEARCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("RETRY_MAX") {
            config.retry.max_retries = parse_value("RETRY_MAX", &v)?;
        }
        if let Some(v) = get("RETRY_INITIAL_BACKOFF_MS") {
            config.retry.initial_backoff_ms = parse_value("RETRY_INITIAL_BACKOFF_MS", &v)?;
        }
        if let Some(v) = get("RETRY_MAX_BACKOFF_MS") {
            config.retry.max_backoff_ms = parse_value("RETRY_MAX_BACKOFF_MS", &v)?;
        }
        if let Some(v) = get("DROP_DANGLING_EDGES") {
            config.drop_dangling_edges = parse_value("DROP_DANGLING_EDGES", &v)?;
        }
        if let Some(v) = get("LOG_FORMAT") {
            config.log_format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                other => anyhow::bail!("LOG_FORMAT must be json or pretty, got {:?}", other),
            };
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 {
            anyhow::bail!("SEARCH_MAX_RESULTS must be at least 1");
        }
        if self.model.timeout_secs == 0 || self.search.timeout_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        if self.search.provider == SearchProvider::Tavily && self.search.tavily_api_key.is_none() {
            anyhow::bail!("SEARCH_PROVIDER=tavily requires TAVILY_API_KEY");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }

    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            model_timeout: Duration::from_secs(self.model.timeout_secs),
            retry: self.retry_policy(),
            drop_dangling_edges: self.drop_dangling_edges,
        }
    }

    pub fn expander_options(&self) -> ExpanderOptions {
        ExpanderOptions {
            max_results: self.search.max_results,
            search_timeout: Duration::from_secs(self.search.timeout_secs),
            retry: self.retry_policy(),
        }
    }
}

fn parse_mode(value: &str) -> Result<OperationMode> {
    match value.to_lowercase().as_str() {
        "fast" => Ok(OperationMode::Fast),
        "balanced" => Ok(OperationMode::Balanced),
        "accurate" => Ok(OperationMode::Accurate),
        other => anyhow::bail!("APP_MODE must be fast, balanced or accurate, got {:?}", other),
    }
}

fn parse_provider(value: &str) -> Result<SearchProvider> {
    match value.to_lowercase().as_str() {
        "duckduckgo" | "ddg" => Ok(SearchProvider::DuckDuckGo),
        "tavily" => Ok(SearchProvider::Tavily),
        other => anyhow::bail!("SEARCH_PROVIDER must be duckduckgo or tavily, got {:?}", other),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", key, value))
}

/// A missing `.env` is fine; one that exists but can't be read or parsed is not.
fn dotenv_loaded(result: std::result::Result<PathBuf, dotenvy::Error>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).context("failed to load .env"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.mode, OperationMode::Balanced);
        assert_eq!(config.model.model, "llama3.2:3b");
        assert_eq!(config.model.timeout_secs, 30);
        assert_eq!(config.search.timeout_secs, 5);
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.search.provider, SearchProvider::DuckDuckGo);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert!(!config.drop_dangling_edges);
    }

    #[test]
    fn test_mode_preset_then_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("APP_MODE", "Accurate"),
            ("MODEL_TIMEOUT_SECS", "90"),
            ("OLLAMA_MODEL", "qwen2.5:7b"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("DROP_DANGLING_EDGES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.mode, OperationMode::Accurate);
        assert_eq!(config.model.timeout_secs, 90);
        assert_eq!(config.search.timeout_secs, 10);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.model.model, "qwen2.5:7b");
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.extractor_options().drop_dangling_edges);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(AppConfig::from_lookup(lookup(&[("APP_MODE", "turbo")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("RETRY_MAX", "many")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("SEARCH_MAX_RESULTS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_tavily_requires_key() {
        assert!(AppConfig::from_lookup(lookup(&[("SEARCH_PROVIDER", "tavily")])).is_err());

        let config = AppConfig::from_lookup(lookup(&[
            ("SEARCH_PROVIDER", "tavily"),
            ("TAVILY_API_KEY", "tvly-123"),
        ]))
        .unwrap();
        assert_eq!(config.search.provider, SearchProvider::Tavily);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = AppConfig::from_lookup(lookup(&[("OLLAMA_MODEL", "  ")])).unwrap();
        assert_eq!(config.model.model, "llama3.2:3b");
    }

    #[test]
    fn test_options_mapping() {
        let config = AppConfig::fast_mode();
        assert_eq!(config.extractor_options().model_timeout, Duration::from_secs(15));
        assert_eq!(config.expander_options().search_timeout, Duration::from_secs(3));
        assert_eq!(config.retry_policy().max_retries(), 0);
    }

    #[test]
    fn test_dotenv_only_missing_file_is_ignored() {
        assert!(dotenv_loaded(Ok(PathBuf::from(".env"))).is_ok());

        let missing = dotenvy::Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(dotenv_loaded(Err(missing)).is_ok());

        let malformed = dotenvy::Error::LineParse("BAD LINE".to_string(), 3);
        let err = dotenv_loaded(Err(malformed)).unwrap_err();
        assert!(err.to_string().contains(".env"));

        let unreadable = dotenvy::Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(dotenv_loaded(Err(unreadable)).is_err());
    }
}
