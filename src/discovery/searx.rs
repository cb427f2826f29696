//! SearXNG metasearch through its JSON API.
//!
//! Only enabled when `discovery.searxng_url` points at an instance with the
//! `json` output format turned on.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::SearchBackend;
use crate::error::DiscoveryError;

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
}

#[derive(Debug, Clone)]
pub struct Searx {
    client: Client,
    base_url: String,
}

impl Searx {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchBackend for Searx {
    fn name(&self) -> &str {
        "searxng"
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, keyword: &str) -> Result<Vec<String>, DiscoveryError> {
        let response: SearxResponse = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", keyword), ("format", "json"), ("categories", "news")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let links: Vec<String> = response.results.into_iter().map(|r| r.url).collect();
        debug!(count = links.len(), "SearXNG results");
        Ok(links)
    }
}
