//! Keyless search through DuckDuckGo's HTML results page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::client::{SearchHit, WebSearch};

pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

static RESULT: Lazy<Selector> = Lazy::new(|| Selector::parse(".result:not(.result--ad)").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("a.result__a").unwrap());
static SNIPPET: Lazy<Selector> = Lazy::new(|| Selector::parse(".result__snippet").unwrap());

pub struct DuckDuckGo {
    endpoint: String,
    client: reqwest::Client,
}

impl DuckDuckGo {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT.to_string())
    }

    pub fn with_endpoint(endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGo {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .context("Failed to send DuckDuckGo search request")?;

        if !response.status().is_success() {
            anyhow::bail!("DuckDuckGo search failed: {}", response.status());
        }

        let html = response
            .text()
            .await
            .context("Failed to read DuckDuckGo response")?;

        Ok(parse_results(&html, max_results))
    }

    fn provider_name(&self) -> &str {
        "duckduckgo"
    }
}

/// Pull `(title, snippet)` pairs out of a results page, skipping ads and untitled blocks.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);

    document
        .select(&RESULT)
        .filter_map(|block| {
            let title = block.select(&TITLE).next().map(element_text)?;
            if title.is_empty() {
                return None;
            }
            let snippet = block
                .select(&SNIPPET)
                .next()
                .map(element_text)
                .unwrap_or_default();
            Some(SearchHit { title, snippet })
        })
        .take(max_results)
        .collect()
}

/// Text content with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FAda_Lovelace">Ada <b>Lovelace</b> - Wikipedia</a>
    </h2>
    <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x"><b>Ada</b> Lovelace was an English mathematician &amp; writer, known for work on Babbage&#x27;s engine.</a>
  </div>
</div>
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=y">Analytical Engine</a>
    </h2>
  </div>
</div>
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=z">Charles Babbage</a>
    </h2>
    <a class="result__snippet" href="//duckduckgo.com/l/?uddg=z">Babbage   designed the
      Difference Engine &#8212; a calculator.</a>
  </div>
</div>
"#;

    #[test]
    fn test_parse_results() {
        let hits = parse_results(PAGE, 10);
        assert_eq!(hits.len(), 3);

        assert_eq!(hits[0].title, "Ada Lovelace - Wikipedia");
        assert_eq!(
            hits[0].snippet,
            "Ada Lovelace was an English mathematician & writer, known for work on Babbage's engine."
        );

        // No snippet of its own: must not borrow the next result's.
        assert_eq!(hits[1].title, "Analytical Engine");
        assert_eq!(hits[1].snippet, "");

        assert_eq!(hits[2].snippet, "Babbage designed the Difference Engine — a calculator.");
    }

    #[test]
    fn test_parse_results_respects_limit() {
        let hits = parse_results(PAGE, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "Analytical Engine");
    }

    #[test]
    fn test_parse_results_empty_page() {
        assert!(parse_results("<html><body>No results.</body></html>", 3).is_empty());
    }

    #[test]
    fn test_class_lists_and_quoting_variants() {
        let page = r#"
<div class='result web-result'>
  <h2><a class="js-result-title-link result__a" href="/a">Marie &lt;Curie&gt;</a></h2>
  <div class='result__snippet extra'>Physicist &amp; chemist.</div>
</div>
<div class="result result--ad">
  <a class="result__a" href="/ad">Sponsored</a>
  <a class="result__snippet" href="/ad">Buy now.</a>
</div>
<div class="result">
  <a class="result__a" href="/empty">   </a>
</div>
"#;
        let hits = parse_results(page, 10);
        assert_eq!(hits, vec![SearchHit::new("Marie <Curie>", "Physicist & chemist.")]);
    }
}
