//! Open Library search client.
//!
//! Endpoint: GET {endpoint}?q=<query>
//! Only the first `limit` documents are kept.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{BookSearch, SearchHit};
use crate::core::{ShelfError, ShelfResult};

pub const DEFAULT_ENDPOINT: &str = "https://openlibrary.org/search.json";
pub const DEFAULT_LIMIT: usize = 10;

/// Open Library search client
pub struct OpenLibraryClient {
    endpoint: String,
    limit: usize,
    client: reqwest::Client,
}

/// Response body of the search endpoint
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub docs: Vec<SearchDoc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchDoc {
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Vec<String>,
    #[serde(default)]
    pub isbn: Vec<String>,
}

impl OpenLibraryClient {
    /// Create a client against the given endpoint
    pub fn new(endpoint: impl Into<String>, limit: usize, timeout: Duration) -> ShelfResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShelfError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            limit,
            client,
        })
    }

    /// Create from resolved configuration
    pub fn from_config(config: &crate::config::SearchSettings) -> ShelfResult<Self> {
        Self::new(
            config.endpoint.clone(),
            config.limit,
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait]
impl BookSearch for OpenLibraryClient {
    fn name(&self) -> &str {
        "openlibrary"
    }

    async fn search(&self, query: &str) -> ShelfResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ShelfError::InvalidInput("search query is required".to_string()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Search request failed");
                ShelfError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ShelfError::UpstreamUnavailable(format!(
                "{} returned {}: {}",
                self.endpoint, status, text
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ShelfError::UpstreamUnavailable(format!("undecodable response: {}", e)))?;

        let hits = to_hits(body, self.limit);
        debug!(query, hits = hits.len(), "Search completed");
        Ok(hits)
    }
}

/// Map raw documents to hits, keeping at most `limit`
pub fn to_hits(response: SearchResponse, limit: usize) -> Vec<SearchHit> {
    response
        .docs
        .into_iter()
        .take(limit)
        .map(|doc| SearchHit {
            title: doc.title.unwrap_or_default(),
            author: if doc.author_name.is_empty() {
                "Unknown".to_string()
            } else {
                doc.author_name.join(", ")
            },
            isbn: doc.isbn.into_iter().next(),
        })
        .collect()
}
