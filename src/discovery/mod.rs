//! Source discovery: turn a keyword into candidate article URLs.
//!
//! The [`DiscoveryCascade`] walks an ordered list of search backends and
//! collects candidate URLs until it has an unused one at or after position
//! `skip`. Candidates on blacklisted domains are dropped; URLs the current
//! task has already used keep their position but are never returned.
//!
//! # Supported Backends
//!
//! | Backend | Module | Method |
//! |---------|--------|--------|
//! | Bing News | [`bing`] | RSS search feed |
//! | DuckDuckGo | [`duckduckgo`] | HTML results page |
//! | SearXNG | [`searx`] | JSON API, needs a configured instance |
//!
//! When the keyword carries Vietnamese diacritics, the whole backend list is
//! tried a second time with the ASCII-folded keyword before giving up.

pub mod bing;
pub mod duckduckgo;
pub mod searx;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{BackendKind, Config};
use crate::error::DiscoveryError;
use crate::utils::{domain_matches, fold_ascii, host_of};

/// A search service that returns article URLs for a keyword, best first.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, keyword: &str) -> Result<Vec<String>, DiscoveryError>;
}

/// Ordered list of search backends plus the candidate filters.
pub struct DiscoveryCascade {
    backends: Vec<Arc<dyn SearchBackend>>,
    blacklist: Vec<String>,
    timeout: Duration,
}

impl DiscoveryCascade {
    pub fn new(
        backends: Vec<Arc<dyn SearchBackend>>,
        blacklist: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backends,
            blacklist,
            timeout,
        }
    }

    /// Build the configured backends, in configured order.
    pub fn from_config(config: &Config, client: Client) -> Self {
        let discovery = &config.discovery;
        let mut backends: Vec<Arc<dyn SearchBackend>> = Vec::new();
        for kind in &discovery.backends {
            match kind {
                BackendKind::BingNews => {
                    backends.push(Arc::new(bing::BingNews::new(client.clone(), &discovery.market)))
                }
                BackendKind::Duckduckgo => backends.push(Arc::new(
                    duckduckgo::DuckDuckGo::new(client.clone(), &discovery.market),
                )),
                BackendKind::Searxng => match &discovery.searxng_url {
                    Some(base) => {
                        backends.push(Arc::new(searx::Searx::new(client.clone(), base)))
                    }
                    None => debug!("searxng backend listed without searxng_url; skipping"),
                },
            }
        }
        info!(
            backends = %backends.iter().map(|b| b.name()).join(", "),
            blacklist = discovery.blacklist.len(),
            "Discovery cascade ready"
        );
        Self::new(backends, discovery.blacklist.clone(), config.discovery_timeout())
    }

    /// Return the first candidate at or after position `skip` that is not in
    /// `excluded`.
    ///
    /// Positions count distinct, non-blacklisted candidates in backend order,
    /// used ones included, so `skip = slot + attempt` lands on the next unused
    /// URL once the task's earlier picks are in `excluded`. Backends are
    /// queried in order until such a candidate is known.
    #[instrument(level = "info", skip(self, excluded), fields(excluded = excluded.len()))]
    pub async fn discover(
        &self,
        keyword: &str,
        skip: usize,
        excluded: &HashSet<String>,
    ) -> Result<String, DiscoveryError> {
        let mut candidates: Vec<String> = Vec::new();

        for variant in keyword_variants(keyword) {
            for backend in &self.backends {
                let found = match timeout(self.timeout, backend.search(&variant)).await {
                    Ok(Ok(urls)) => urls,
                    Ok(Err(e)) => {
                        warn!(backend = backend.name(), error = %e, "Search backend failed");
                        continue;
                    }
                    Err(_) => {
                        warn!(
                            backend = backend.name(),
                            timeout_secs = self.timeout.as_secs(),
                            "Search backend timed out"
                        );
                        continue;
                    }
                };

                let before = candidates.len();
                for url in found {
                    let Some(url) = normalize_candidate(&url) else {
                        continue;
                    };
                    if self.allows(&url) && !candidates.contains(&url) {
                        candidates.push(url);
                    }
                }
                debug!(
                    backend = backend.name(),
                    variant = %variant,
                    added = candidates.len() - before,
                    total = candidates.len(),
                    "Collected candidates"
                );

                if let Some((position, url)) = candidates
                    .iter()
                    .enumerate()
                    .skip(skip)
                    .find(|(_, url)| !excluded.contains(*url))
                {
                    info!(%url, backend = backend.name(), skip, position, "Discovered candidate");
                    return Ok(url.clone());
                }
            }
        }

        warn!(found = candidates.len(), skip, "Discovery exhausted every backend");
        Err(DiscoveryError::NotFound {
            keyword: keyword.to_string(),
        })
    }

    /// Has a host, and that host is not on a blacklisted domain.
    pub fn allows(&self, url: &str) -> bool {
        match host_of(url) {
            Some(host) => !self.is_blacklisted(&host),
            None => false,
        }
    }

    pub fn is_blacklisted(&self, host: &str) -> bool {
        self.blacklist.iter().any(|d| domain_matches(host, d))
    }
}

/// The keyword, followed by its ASCII-folded form when that differs.
pub fn keyword_variants(keyword: &str) -> Vec<String> {
    let keyword = keyword.trim().to_string();
    let folded = fold_ascii(&keyword);
    if folded == keyword {
        vec![keyword]
    } else {
        vec![keyword, folded]
    }
}

/// Keep http(s) article URLs, dropping fragments and bare homepages.
pub fn normalize_candidate(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    if url.path() == "/" && url.query().is_none() {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Pull the destination out of a search engine click-tracking link.
pub fn unwrap_redirect(link: &str, param: &str) -> Option<String> {
    let absolute = if link.starts_with("//") {
        format!("https:{link}")
    } else {
        link.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    url.query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case(param))
        .map(|(_, v)| v.into_owned())
        .or(Some(absolute))
}
