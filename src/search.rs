//! Web search using SearXNG
//!
//! Results are folded into the task text as a context block before the
//! plan is built, so every agent in the plan sees them. Classification
//! still runs on the raw user input.

use crate::config::SearchConfig;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Search failed: {0}")]
    SearchFailed(String),
}

pub struct WebSearch {
    client: Client,
    searxng_url: String,
    max_results: usize,
}

impl WebSearch {
    pub fn new() -> Self {
        Self::from_config(&SearchConfig::default())
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            client: Client::new(),
            searxng_url: url.trim_end_matches('/').to_string(),
            max_results: SearchConfig::default().max_results,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_results: config.max_results,
            ..Self::with_url(&config.searxng_url)
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchResults, SearchError> {
        debug!(query, url = %self.searxng_url, "Web search");

        let response = self
            .client
            .get(format!("{}/search", self.searxng_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::SearchFailed(response.status().to_string()));
        }

        let data: SearxResponse = response
            .json()
            .await
            .map_err(|e| SearchError::SearchFailed(format!("Failed to parse response: {}", e)))?;

        let mut results = SearchResults::from(data);
        results.results.truncate(self.max_results);
        debug!(count = results.results.len(), "Web search results");
        Ok(results)
    }
}

impl Default for WebSearch {
    fn default() -> Self {
        Self::new()
    }
}

// SearXNG response types
#[derive(Debug, Deserialize)]
struct SearxResponse {
    query: String,
    results: Vec<SearxResult>,
    #[serde(default)]
    infoboxes: Vec<SearxInfobox>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SearxInfobox {
    infobox: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub query: String,
    pub infoboxes: Vec<(String, String)>,
    pub results: Vec<SearchHit>,
}

impl From<SearxResponse> for SearchResults {
    fn from(data: SearxResponse) -> Self {
        Self {
            query: data.query,
            infoboxes: data
                .infoboxes
                .into_iter()
                .map(|i| (i.infobox, i.content))
                .collect(),
            results: data
                .results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.url,
                    snippet: r.content,
                })
                .collect(),
        }
    }
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.infoboxes.is_empty()
    }

    /// Render as markdown for inclusion in a prompt
    pub fn to_context(&self) -> String {
        let mut text = String::new();

        // Infoboxes first
        for (title, content) in &self.infoboxes {
            text.push_str(&format!("## Infobox: {}\n{}\n\n", title, content));
        }

        if self.results.is_empty() {
            text.push_str("No results found.\n");
        } else {
            for hit in &self.results {
                text.push_str(&format!("### {}\n", hit.title));
                text.push_str(&format!("URL: {}\n", hit.url));
                text.push_str(&format!("{}\n\n", hit.snippet));
            }
        }

        text.trim_end().to_string()
    }
}

/// Prepend search results to a task. Empty results leave the task as is.
pub fn enrich_prompt(task: &str, results: &SearchResults) -> String {
    if results.is_empty() {
        return task.to_string();
    }
    format!(
        "Web search results for \"{}\":\n\n{}\n\n{}",
        results.query,
        results.to_context(),
        task
    )
}
