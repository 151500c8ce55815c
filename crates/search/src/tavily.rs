use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::{SearchHit, WebSearch};

pub const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily API client for web search
pub struct Tavily {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    #[serde(default)]
    content: String,
}

impl Tavily {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Tavily API key is empty");
        }
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            endpoint,
            client,
        })
    }
}

#[async_trait]
impl WebSearch for Tavily {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("Failed to send Tavily search request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Tavily API error {}: {}", status, body);
        }

        let tavily_response: TavilyResponse = response
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        Ok(into_hits(tavily_response, max_results))
    }

    fn provider_name(&self) -> &str {
        "tavily"
    }
}

fn into_hits(response: TavilyResponse, max_results: usize) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .take(max_results)
        .map(|r| SearchHit {
            title: r.title,
            snippet: r.content,
        })
        .collect()
}
