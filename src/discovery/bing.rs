//! Bing News search through its RSS output.
//!
//! `https://www.bing.com/news/search?q=...&format=rss` returns an RSS 2.0 feed
//! whose `<link>` elements are click-tracking URLs. The real article URL sits
//! in the `url` query parameter and is unwrapped before returning.

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{SearchBackend, unwrap_redirect};
use crate::error::DiscoveryError;

const NAME: &str = "bing_news";

#[derive(Debug, Clone)]
pub struct BingNews {
    client: Client,
    base_url: String,
    market: String,
}

impl BingNews {
    pub fn new(client: Client, market: &str) -> Self {
        Self::with_base_url(client, market, "https://www.bing.com")
    }

    pub fn with_base_url(client: Client, market: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            market: market.to_string(),
        }
    }
}

#[async_trait]
impl SearchBackend for BingNews {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, keyword: &str) -> Result<Vec<String>, DiscoveryError> {
        let url = format!(
            "{}/news/search?q={}&format=rss&mkt={}",
            self.base_url,
            urlencoding::encode(keyword),
            self.market
        );
        let xml = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let links = parse_rss_links(&xml)?
            .into_iter()
            .filter_map(|link| unwrap_redirect(&link, "url"))
            .collect::<Vec<_>>();
        debug!(count = links.len(), "Bing News results");
        Ok(links)
    }
}

/// Collect the text of every `<item><link>` in an RSS document.
pub fn parse_rss_links(xml: &str) -> Result<Vec<String>, DiscoveryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut in_item = false;
    let mut in_link = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => in_item = true,
                b"link" if in_item => {
                    in_link = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"item" => in_item = false,
                b"link" if in_link => {
                    in_link = false;
                    let link = current.trim();
                    if !link.is_empty() {
                        links.push(link.to_string());
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_link => {
                let text = t.decode().map_err(|e| DiscoveryError::backend(NAME, e))?;
                current.push_str(&text);
            }
            Ok(Event::CData(t)) if in_link => {
                let text = t.decode().map_err(|e| DiscoveryError::backend(NAME, e))?;
                current.push_str(&text);
            }
            Ok(Event::GeneralRef(r)) if in_link => {
                match r
                    .resolve_char_ref()
                    .map_err(|e| DiscoveryError::backend(NAME, e))?
                {
                    Some(c) => current.push(c),
                    None => {
                        let name = r.decode().map_err(|e| DiscoveryError::backend(NAME, e))?;
                        current.push_str(match name.as_ref() {
                            "amp" => "&",
                            "lt" => "<",
                            "gt" => ">",
                            "quot" => "\"",
                            "apos" => "'",
                            _ => "",
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DiscoveryError::backend(NAME, e)),
            _ => {}
        }
    }

    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<rss version="2.0">
  <channel>
    <title>test - Bing News</title>
    <link>https://www.bing.com/news/search?q=test</link>
    <item>
      <title>First</title>
      <link>http://www.bing.com/news/apiclick.aspx?ref=FexRss&amp;aid=&amp;url=https%3a%2f%2fvnexpress.net%2fbai-viet-1.html&amp;c=1</link>
    </item>
    <item>
      <title>Second</title>
      <link>https://tuoitre.vn/bai-viet-2.htm</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_links_skips_channel_link() {
        let links = parse_rss_links(FEED).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links[0].contains("apiclick.aspx"));
        assert!(links[0].contains("&url="));
        assert_eq!(links[1], "https://tuoitre.vn/bai-viet-2.htm");
    }

    #[test]
    fn test_parse_rss_links_empty_feed() {
        let links = parse_rss_links("<rss><channel></channel></rss>").unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_search_unwraps_tracking_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/search"))
            .and(query_param("format", "rss"))
            .and(query_param("q", "test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let bing = BingNews::with_base_url(Client::new(), "vi-VN", &server.uri());
        let links = bing.search("test").await.unwrap();
        assert_eq!(
            links,
            vec![
                "https://vnexpress.net/bai-viet-1.html".to_string(),
                "https://tuoitre.vn/bai-viet-2.htm".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_search_http_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let bing = BingNews::with_base_url(Client::new(), "vi-VN", &server.uri());
        assert!(matches!(
            bing.search("test").await,
            Err(DiscoveryError::Backend { .. })
        ));
    }
}
