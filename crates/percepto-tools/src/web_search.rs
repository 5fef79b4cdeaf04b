use async_trait::async_trait;
use percepto_core::{PerceptoError, Result, RouteKind, ToolAnswer, ToolRetriever};
use tracing::debug;

const MAX_RESULTS: usize = 3;

/// Web search through SerpAPI: merges the top organic result snippets.
pub struct WebSearchRetriever {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl WebSearchRetriever {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: "https://serpapi.com".into(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

/// Cut text after its second period.
fn truncate_snippet(text: &str) -> String {
    let pieces: Vec<&str> = text.split('.').collect();
    if pieces.len() > 2 {
        format!("{}.", pieces[..2].join("."))
    } else {
        text.to_string()
    }
}

#[async_trait]
impl ToolRetriever for WebSearchRetriever {
    fn kind(&self) -> RouteKind {
        RouteKind::WebSearch
    }

    fn name(&self) -> &str {
        "web_search"
    }

    async fn retrieve(&self, query: &str) -> Result<ToolAnswer> {
        debug!(query, "searching the web");

        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| PerceptoError::tool("web_search", e))?;

        if !resp.status().is_success() {
            return Err(PerceptoError::tool("web_search", format!("HTTP {}", resp.status())));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PerceptoError::tool("web_search", e))?;

        let results: Vec<&serde_json::Value> = data["organic_results"]
            .as_array()
            .map(|items| items.iter().take(MAX_RESULTS).collect())
            .unwrap_or_default();
        if results.is_empty() {
            return Err(PerceptoError::tool("web_search", "no organic results"));
        }

        let snippets: Vec<String> = results
            .iter()
            .map(|r| truncate_snippet(r["snippet"].as_str().unwrap_or("")))
            .collect();
        let links: Vec<&str> = results.iter().map(|r| r["link"].as_str().unwrap_or("")).collect();

        Ok(ToolAnswer::new(
            format!(
                "I have searched the web and found the following: {}",
                snippets.join(" ")
            ),
            links.join(", "),
        ))
    }
}
