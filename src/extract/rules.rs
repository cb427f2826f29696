//! Per-domain extraction rules.
//!
//! Sites with stable markup get an explicit title selector and content
//! container selector. Adding a site means adding a row here; the cascade
//! picks rows up automatically and tries them before any heuristic.

/// Selectors for one news site. `domain` also matches its subdomains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainRule {
    pub domain: &'static str,
    pub title: &'static str,
    pub content: &'static str,
}

pub const DOMAIN_RULES: &[DomainRule] = &[
    DomainRule {
        domain: "lite.cnn.com",
        title: ".headline--lite",
        content: ".article--lite",
    },
    DomainRule {
        domain: "text.npr.org",
        title: ".story-title",
        content: ".paragraphs-container",
    },
    DomainRule {
        domain: "vnexpress.net",
        title: "h1.title-detail",
        content: "article.fck_detail",
    },
    DomainRule {
        domain: "dantri.com.vn",
        title: "h1.title-page",
        content: "div.singular-content",
    },
    DomainRule {
        domain: "tuoitre.vn",
        title: "h1.detail-title",
        content: "div.detail-cmain",
    },
    DomainRule {
        domain: "thanhnien.vn",
        title: "h1.detail-title",
        content: "div.detail-cmain",
    },
    DomainRule {
        domain: "vietnamnet.vn",
        title: "h1.content-detail-title",
        content: "div.maincontent",
    },
    DomainRule {
        domain: "znews.vn",
        title: "h1.the-article-title",
        content: "div.the-article-body",
    },
    DomainRule {
        domain: "zingnews.vn",
        title: "h1.the-article-title",
        content: "div.the-article-body",
    },
    DomainRule {
        domain: "laodong.vn",
        title: "h1.title",
        content: "div.art-body",
    },
    DomainRule {
        domain: "aljazeera.com",
        title: "h1",
        content: "div.wysiwyg",
    },
    DomainRule {
        domain: "bbc.com",
        title: "h1",
        content: "article",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[test]
    fn test_every_rule_selector_parses() {
        for rule in DOMAIN_RULES {
            assert!(Selector::parse(rule.title).is_ok(), "bad title selector for {}", rule.domain);
            assert!(
                Selector::parse(rule.content).is_ok(),
                "bad content selector for {}",
                rule.domain
            );
        }
    }

    #[test]
    fn test_domains_are_unique() {
        let mut domains: Vec<_> = DOMAIN_RULES.iter().map(|r| r.domain).collect();
        domains.sort();
        domains.dedup();
        assert_eq!(domains.len(), DOMAIN_RULES.len());
    }
}
