use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

/// A generative text model: one prompt in, the complete response text out.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    json_mode: bool,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            json_mode: false,
            client: reqwest::Client::new(),
        }
    }

    /// Ask Ollama to constrain decoding to JSON. Off by default; the recovery parser copes
    /// with free-form replies.
    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    pub fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.to_string(), DEFAULT_MODEL.to_string())
    }
}

#[async_trait]
impl TextModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: self.json_mode.then_some("json"),
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama request failed: {} {}", status, body);
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_format_unless_json_mode() {
        let request = OllamaRequest {
            model: DEFAULT_MODEL,
            prompt: "hi",
            stream: false,
            format: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2:3b");
        assert_eq!(json["stream"], false);
        assert!(json.get("format").is_none());

        let client = OllamaClient::default().with_json_mode(true);
        assert_eq!(client.json_mode.then_some("json"), Some("json"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = OllamaClient::new("http://ollama:11434/".to_string(), "m".to_string());
        assert_eq!(client.base_url, "http://ollama:11434");
        assert_eq!(client.model_name(), "m");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        // Port 9 (discard) is closed on test hosts.
        let client = OllamaClient::new("http://127.0.0.1:9".to_string(), "m".to_string());
        assert!(client.complete("hello").await.is_err());
    }
}
