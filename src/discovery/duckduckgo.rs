//! DuckDuckGo's HTML-only results page.
//!
//! Result anchors (`a.result__a`) point at `//duckduckgo.com/l/?uddg=<target>`;
//! the target is percent-decoded out of the `uddg` parameter. Sponsored results
//! go through `y.js` and are dropped.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use super::{SearchBackend, unwrap_redirect};
use crate::error::DiscoveryError;

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a[href]").expect("valid selector"));

#[derive(Debug, Clone)]
pub struct DuckDuckGo {
    client: Client,
    base_url: String,
    region: String,
}

impl DuckDuckGo {
    pub fn new(client: Client, market: &str) -> Self {
        Self::with_base_url(client, market, "https://html.duckduckgo.com")
    }

    pub fn with_base_url(client: Client, market: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            region: region_for_market(market),
        }
    }
}

/// DuckDuckGo wants `vn-vi` where Bing wants `vi-VN`.
fn region_for_market(market: &str) -> String {
    match market.split_once('-') {
        Some((lang, country)) => format!("{}-{}", country.to_lowercase(), lang.to_lowercase()),
        None => "wt-wt".to_string(),
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGo {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, keyword: &str) -> Result<Vec<String>, DiscoveryError> {
        let url = format!(
            "{}/html/?q={}&kl={}",
            self.base_url,
            urlencoding::encode(keyword),
            self.region
        );
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let links = parse_results(&body);
        debug!(count = links.len(), "DuckDuckGo results");
        Ok(links)
    }
}

pub fn parse_results(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.contains("/y.js"))
        .filter_map(|href| unwrap_redirect(href, "uddg"))
        .collect()
}
