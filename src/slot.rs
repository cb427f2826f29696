//! Article slot processing: discover, extract and rewrite one article.
//!
//! Each attempt consumes a fresh candidate URL. Fetch failures and extraction
//! misses move on to the next attempt. Discovery exhaustion and rewrite errors
//! end the slot immediately, including blank or error-sentinel replies.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::discovery::DiscoveryCascade;
use crate::extract::{Extracted, ExtractionCascade};
use crate::fetch::MarkupFetcher;
use crate::models::{ArticleSlot, RewrittenArticle};
use crate::rewrite::{RewriteProvider, check_reply};

pub const NO_CANDIDATE: &str = "no candidate article found";
const INVALID_ARTICLE: &str = "rewritten article failed validation";

/// What a single attempt ended with.
enum AttemptOutcome {
    /// Terminal success.
    Rewritten(RewrittenArticle),
    /// Terminal failure.
    Fatal { url: Option<String>, reason: String },
    /// The URL was unusable; another attempt may help.
    Miss { url: String, reason: String },
}

pub struct SlotProcessor {
    discovery: Arc<DiscoveryCascade>,
    fetcher: Arc<dyn MarkupFetcher>,
    extractor: Arc<ExtractionCascade>,
    rewriter: Arc<dyn RewriteProvider>,
    max_attempts: usize,
}

impl SlotProcessor {
    pub fn new(
        discovery: Arc<DiscoveryCascade>,
        fetcher: Arc<dyn MarkupFetcher>,
        extractor: Arc<ExtractionCascade>,
        rewriter: Arc<dyn RewriteProvider>,
        max_attempts: usize,
    ) -> Self {
        Self {
            discovery,
            fetcher,
            extractor,
            rewriter,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Drive slot `slot_index` to a terminal state.
    ///
    /// Every URL handed out by discovery is added to `excluded` before it is
    /// fetched, so later attempts and later slots never see it again.
    #[instrument(level = "info", skip(self, excluded), fields(slot = slot_index))]
    pub async fn process(
        &self,
        keyword: &str,
        slot_index: usize,
        excluded: &mut HashSet<String>,
    ) -> ArticleSlot {
        let mut slot = ArticleSlot::pending(slot_index);
        let mut last_miss: Option<(String, String)> = None;

        for attempt in 0..self.max_attempts {
            match self.attempt(keyword, slot_index + attempt, excluded).await {
                AttemptOutcome::Rewritten(article) => {
                    let url = article.url.clone();
                    slot.succeed(article);
                    if !slot.satisfies_success_invariant(self.extractor.min_content_chars()) {
                        warn!(attempt, %url, "Rewritten article failed validation");
                        let mut failed = ArticleSlot::pending(slot_index);
                        failed.fail(Some(url), INVALID_ARTICLE);
                        return failed;
                    }
                    info!(%url, attempt, "Slot succeeded");
                    return slot;
                }
                AttemptOutcome::Fatal { url, reason } => {
                    warn!(attempt, url = ?url, %reason, "Slot failed");
                    slot.fail(url, reason);
                    return slot;
                }
                AttemptOutcome::Miss { url, reason } => {
                    warn!(attempt, %url, %reason, "Attempt missed; trying another URL");
                    last_miss = Some((url, reason));
                }
            }
        }

        let (url, reason) = last_miss
            .map(|(url, reason)| (Some(url), reason))
            .unwrap_or((None, NO_CANDIDATE.to_string()));
        warn!(attempts = self.max_attempts, %reason, "Slot exhausted its attempts");
        slot.fail(url, reason);
        slot
    }

    async fn attempt(
        &self,
        keyword: &str,
        skip: usize,
        excluded: &mut HashSet<String>,
    ) -> AttemptOutcome {
        let url = match self.discovery.discover(keyword, skip, excluded).await {
            Ok(url) => url,
            Err(e) => {
                return AttemptOutcome::Fatal {
                    url: None,
                    reason: format!("{NO_CANDIDATE}: {e}"),
                };
            }
        };
        excluded.insert(url.clone());

        let markup = match self.fetcher.fetch(&url).await {
            Ok(markup) => markup,
            Err(e) => {
                return AttemptOutcome::Miss {
                    url,
                    reason: e.to_string(),
                };
            }
        };

        let Extracted { title, content, .. } = match self.extractor.extract(&url, &markup) {
            Ok(extracted) => extracted,
            Err(e) => {
                return AttemptOutcome::Miss {
                    url,
                    reason: e.to_string(),
                };
            }
        };

        // Providers other than the HTTP client may hand back blank or error text.
        match self
            .rewriter
            .rewrite(&title, &content)
            .await
            .and_then(|text| check_reply(&text))
        {
            Ok(rewritten) => AttemptOutcome::Rewritten(RewrittenArticle {
                url,
                title,
                content,
                rewritten,
            }),
            Err(e) => AttemptOutcome::Fatal {
                url: Some(url),
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::discovery::SearchBackend;
    use crate::discovery::tests::{FakeBackend, cascade};
    use crate::error::{FetchError, RewriteError};
    use crate::extract::tests::article_page;
    use crate::models::SlotStatus;
    use crate::rewrite::tests::FakeProvider;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    /// Serves canned markup per URL and records fetch order.
    pub(crate) struct FakeFetcher {
        pages: HashMap<String, String>,
        pub(crate) fetched: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn new(pages: &[(&str, String)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, p)| (u.to_string(), p.clone()))
                    .collect(),
                fetched: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MarkupFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.fetched.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    pub(crate) fn good_page(title: &str) -> String {
        article_page(title, 6)
    }

    pub(crate) fn thin_page(title: &str) -> String {
        article_page(title, 1)
    }

    pub(crate) fn processor(
        urls: &[&str],
        fetcher: Arc<FakeFetcher>,
        provider: Arc<FakeProvider>,
    ) -> SlotProcessor {
        let backend: Arc<dyn SearchBackend> = Arc::new(FakeBackend::new("fake", "tin tuc", urls));
        SlotProcessor::new(
            Arc::new(cascade(vec![backend], &["youtube.com"])),
            fetcher,
            Arc::new(ExtractionCascade::new(200, 30)),
            provider,
            3,
        )
    }

    #[tokio::test]
    async fn test_first_good_candidate_succeeds() {
        let fetcher = Arc::new(FakeFetcher::new(&[("https://a.vn/1", good_page("Bài 1"))]));
        let provider = Arc::new(FakeProvider::ok());
        let p = processor(&["https://a.vn/1"], fetcher, provider.clone());

        let mut excluded = HashSet::new();
        let slot = p.process("tin tuc", 0, &mut excluded).await;

        assert_eq!(slot.status, SlotStatus::Succeeded);
        assert_eq!(slot.source_url.as_deref(), Some("https://a.vn/1"));
        assert_eq!(slot.source_title.as_deref(), Some("Bài 1"));
        assert_eq!(slot.rewritten_content.as_deref(), Some("Bản viết lại: Bài 1"));
        assert!(slot.satisfies_success_invariant(200));
        assert!(excluded.contains("https://a.vn/1"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_thin_page_is_replaced_by_next_candidate() {
        let fetcher = Arc::new(FakeFetcher::new(&[
            ("https://a.vn/1", thin_page("Ngắn")),
            ("https://a.vn/2", thin_page("Cũng ngắn")),
            ("https://a.vn/3", good_page("Dài")),
        ]));
        let provider = Arc::new(FakeProvider::ok());
        let p = processor(
            &["https://a.vn/1", "https://a.vn/2", "https://a.vn/3"],
            fetcher.clone(),
            provider,
        );

        let mut excluded = HashSet::new();
        let slot = p.process("tin tuc", 0, &mut excluded).await;

        assert_eq!(slot.status, SlotStatus::Succeeded);
        assert_eq!(slot.source_title.as_deref(), Some("Dài"));
        // The rejected URL stays excluded for the rest of the task.
        assert!(excluded.contains("https://a.vn/1"));
        assert!(excluded.contains("https://a.vn/2"));
        // Each retry takes the next unused candidate in order.
        assert_eq!(
            *fetcher.fetched.lock().unwrap(),
            vec![
                "https://a.vn/1".to_string(),
                "https://a.vn/2".to_string(),
                "https://a.vn/3".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhausted_attempts_report_the_shortfall() {
        let fetcher = Arc::new(FakeFetcher::new(&[
            ("https://a.vn/1", thin_page("Một")),
            ("https://a.vn/2", thin_page("Hai")),
            ("https://a.vn/3", thin_page("Ba")),
            ("https://a.vn/4", thin_page("Bốn")),
            ("https://a.vn/5", thin_page("Năm")),
            ("https://a.vn/6", thin_page("Sáu")),
        ]));
        let provider = Arc::new(FakeProvider::ok());
        let urls = [
            "https://a.vn/1",
            "https://a.vn/2",
            "https://a.vn/3",
            "https://a.vn/4",
            "https://a.vn/5",
            "https://a.vn/6",
        ];
        let p = processor(&urls, fetcher.clone(), provider.clone());

        let mut excluded = HashSet::new();
        let slot = p.process("tin tuc", 0, &mut excluded).await;

        assert_eq!(slot.status, SlotStatus::Failed);
        let reason = slot.error_message.unwrap();
        assert!(reason.contains("content length"), "{reason}");
        assert_eq!(fetcher.fetched.lock().unwrap().len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_a_miss() {
        let fetcher = Arc::new(FakeFetcher::new(&[("https://a.vn/3", good_page("Bài 3"))]));
        let p = processor(
            &["https://a.vn/1", "https://a.vn/2", "https://a.vn/3"],
            fetcher,
            Arc::new(FakeProvider::ok()),
        );

        let slot = p.process("tin tuc", 0, &mut HashSet::new()).await;
        assert_eq!(slot.status, SlotStatus::Succeeded);
        assert_eq!(slot.source_url.as_deref(), Some("https://a.vn/3"));
    }

    #[tokio::test]
    async fn test_no_candidates_fails_immediately() {
        let fetcher = Arc::new(FakeFetcher::new(&[]));
        let p = processor(&[], fetcher.clone(), Arc::new(FakeProvider::ok()));

        let slot = p.process("tin tuc", 0, &mut HashSet::new()).await;
        assert_eq!(slot.status, SlotStatus::Failed);
        assert!(slot.error_message.unwrap().starts_with(NO_CANDIDATE));
        assert!(slot.source_url.is_none());
        assert!(fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_error_fails_without_trying_another_url() {
        let fetcher = Arc::new(FakeFetcher::new(&[
            ("https://a.vn/1", good_page("Bài 1")),
            ("https://a.vn/2", good_page("Bài 2")),
        ]));
        let provider = Arc::new(FakeProvider::new(vec![Err(RewriteError::Unavailable(
            "connection refused".into(),
        ))]));
        let p = processor(
            &["https://a.vn/1", "https://a.vn/2"],
            fetcher.clone(),
            provider.clone(),
        );

        let slot = p.process("tin tuc", 0, &mut HashSet::new()).await;
        assert_eq!(slot.status, SlotStatus::Failed);
        assert_eq!(
            slot.error_message.as_deref(),
            Some("provider unavailable: connection refused")
        );
        assert_eq!(slot.source_url.as_deref(), Some("https://a.vn/1"));
        assert_eq!(fetcher.fetched.lock().unwrap().len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_or_error_rewrite_fails_the_slot() {
        for (reply, expected) in [
            ("Error: quota exceeded", "provider returned an error: Error: quota exceeded"),
            ("   ", "provider returned an empty response"),
        ] {
            let fetcher = Arc::new(FakeFetcher::new(&[("https://a.vn/1", good_page("Bài 1"))]));
            let provider = Arc::new(FakeProvider::new(vec![Ok(reply.to_string())]));
            let p = processor(&["https://a.vn/1"], fetcher, provider);

            let slot = p.process("tin tuc", 0, &mut HashSet::new()).await;
            assert_eq!(slot.status, SlotStatus::Failed, "{reply:?}");
            assert_eq!(slot.error_message.as_deref(), Some(expected));
            assert_eq!(slot.source_url.as_deref(), Some("https://a.vn/1"));
            assert!(slot.rewritten_content.is_none());
        }
    }

    #[tokio::test]
    async fn test_later_slot_skips_urls_used_by_earlier_slots() {
        let fetcher = Arc::new(FakeFetcher::new(&[
            ("https://a.vn/1", good_page("Bài 1")),
            ("https://a.vn/2", good_page("Bài 2")),
            ("https://a.vn/3", good_page("Bài 3")),
        ]));
        let p = processor(
            &["https://a.vn/1", "https://a.vn/2", "https://a.vn/3"],
            fetcher,
            Arc::new(FakeProvider::ok()),
        );

        let mut excluded = HashSet::new();
        let first = p.process("tin tuc", 0, &mut excluded).await;
        let second = p.process("tin tuc", 1, &mut excluded).await;
        assert_eq!(first.status, SlotStatus::Succeeded);
        assert_eq!(second.status, SlotStatus::Succeeded);
        assert_ne!(first.source_url, second.source_url);
    }
}
