//! Article extraction: turn raw page markup into a title and body text.
//!
//! The [`ExtractionCascade`] is an ordered list of `(Matcher, Strategy)` pairs.
//! Each applicable strategy is run in turn and the first result with a
//! non-empty title and enough content wins:
//!
//! 1. [`Strategy::Selectors`] for domains listed in [`rules::DOMAIN_RULES`]
//! 2. [`Strategy::Density`], content-density scoring over paragraphs
//! 3. [`Strategy::Structural`], the container with the most paragraph children
//! 4. [`Strategy::LongestBlock`], the longest run of text anywhere
//!
//! A strategy that comes up short is a miss, not an error. If every strategy
//! misses the caller gets [`ExtractError::InsufficientContent`] describing the
//! closest attempt, and is expected to try a different URL.

pub mod heuristics;
pub mod rules;

use scraper::Html;
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, Shortfall};
use crate::utils::{char_len, clean_text, domain_matches, host_of};

/// An extraction that met the quality bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub content: String,
    /// Name of the strategy that produced it.
    pub strategy: &'static str,
}

/// Which URLs a strategy applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Any,
    Domain(&'static str),
}

impl Matcher {
    fn matches(&self, host: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Domain(domain) => host.is_some_and(|h| domain_matches(h, domain)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Selectors {
        title: &'static str,
        content: &'static str,
    },
    Density,
    Structural,
    LongestBlock,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Selectors { .. } => "domain_rule",
            Self::Density => "density",
            Self::Structural => "structural",
            Self::LongestBlock => "longest_block",
        }
    }

    /// Run the strategy. A `None` title means "use the page title".
    fn apply(&self, document: &Html, min_paragraph_chars: usize) -> (Option<String>, String) {
        match self {
            Self::Selectors { title, content } => {
                heuristics::by_selectors(document, title, content)
            }
            Self::Density => (None, heuristics::by_density(document, min_paragraph_chars)),
            Self::Structural => (None, heuristics::by_structure(document, min_paragraph_chars)),
            Self::LongestBlock => (None, heuristics::longest_block(document)),
        }
    }
}

pub struct ExtractionCascade {
    steps: Vec<(Matcher, Strategy)>,
    min_content_chars: usize,
    min_paragraph_chars: usize,
}

impl ExtractionCascade {
    /// Domain rules first, then the generic strategies in order.
    pub fn new(min_content_chars: usize, min_paragraph_chars: usize) -> Self {
        let mut steps: Vec<(Matcher, Strategy)> = rules::DOMAIN_RULES
            .iter()
            .map(|rule| {
                (
                    Matcher::Domain(rule.domain),
                    Strategy::Selectors {
                        title: rule.title,
                        content: rule.content,
                    },
                )
            })
            .collect();
        steps.push((Matcher::Any, Strategy::Density));
        steps.push((Matcher::Any, Strategy::Structural));
        steps.push((Matcher::Any, Strategy::LongestBlock));

        Self {
            steps,
            min_content_chars,
            min_paragraph_chars,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.min_content_chars, config.min_paragraph_chars)
    }

    pub fn min_content_chars(&self) -> usize {
        self.min_content_chars
    }

    /// Strategies that would run for `url`, in order.
    pub fn strategies_for(&self, url: &str) -> Vec<&Strategy> {
        let host = host_of(url);
        self.steps
            .iter()
            .filter(|(m, _)| m.matches(host.as_deref()))
            .map(|(_, s)| s)
            .collect()
    }

    pub fn extract(&self, url: &str, markup: &str) -> Result<Extracted, ExtractError> {
        let document = Html::parse_document(markup);
        let page_title = heuristics::page_title(&document);
        let mut closest: Option<(usize, Shortfall)> = None;

        for strategy in self.strategies_for(url) {
            let (title, content) = strategy.apply(&document, self.min_paragraph_chars);
            let title = title
                .or_else(|| page_title.clone())
                .map(|t| clean_text(&t))
                .unwrap_or_default();
            let content = content.trim().to_string();

            match self.check(&title, &content) {
                Ok(()) => {
                    info!(
                        %url,
                        strategy = strategy.name(),
                        chars = char_len(&content),
                        "Extracted article"
                    );
                    return Ok(Extracted {
                        title,
                        content,
                        strategy: strategy.name(),
                    });
                }
                Err(shortfall) => {
                    debug!(%url, strategy = strategy.name(), %shortfall, "Strategy missed");
                    let len = char_len(&content);
                    if closest.as_ref().is_none_or(|(best, _)| len > *best) {
                        closest = Some((len, shortfall));
                    }
                }
            }
        }

        let shortfall = closest
            .map(|(_, s)| s)
            .unwrap_or(Shortfall::MissingContent);
        Err(ExtractError::InsufficientContent(shortfall))
    }

    fn check(&self, title: &str, content: &str) -> Result<(), Shortfall> {
        if title.is_empty() {
            return Err(Shortfall::MissingTitle);
        }
        if content.is_empty() {
            return Err(Shortfall::MissingContent);
        }
        let len = char_len(content);
        if len < self.min_content_chars {
            return Err(Shortfall::ContentTooShort {
                len,
                min: self.min_content_chars,
            });
        }
        Ok(())
    }
}
