//! DOM heuristics used by the extraction strategies.
//!
//! All functions work on a parsed [`Html`] document and return cleaned text;
//! an empty string means the heuristic found nothing. Length thresholds are
//! counted in characters, not bytes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::utils::{char_len, clean_text};

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid selector"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"], meta[name="twitter:title"]"#)
        .expect("valid selector")
});
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static CONTAINERS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body, main, article, section, div, td").expect("valid selector")
});
static BLOCKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p, div, td, section, article, blockquote, pre, li").expect("valid selector")
});

static BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(comments?|footer|nav|navbar|menu|related|share|social|advert|ads|banner|breadcrumbs?|promo|widget|cookie|subscribe|newsletter|caption)\b",
    )
    .expect("valid regex")
});

const INLINE_TAGS: &[&str] = &[
    "a", "b", "strong", "i", "em", "span", "u", "small", "sup", "sub", "mark", "abbr", "time",
    "font",
];

/// Whitespace-normalised text of an element and all its descendants.
pub fn element_text(el: &ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Heuristic page title: Open Graph / Twitter meta, then `<h1>`, then `<title>`.
pub fn page_title(document: &Html) -> Option<String> {
    let meta = document
        .select(&OG_TITLE)
        .filter_map(|m| m.value().attr("content"))
        .map(clean_text)
        .find(|t| !t.is_empty());
    if meta.is_some() {
        return meta;
    }
    document
        .select(&H1)
        .chain(document.select(&TITLE))
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

/// True for elements whose class or id marks them as page chrome.
fn looks_like_boilerplate(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    let marker = format!(
        "{} {}",
        value.attr("class").unwrap_or_default(),
        value.attr("id").unwrap_or_default()
    );
    BOILERPLATE.is_match(&marker)
}

/// Only the element and its parent are checked; outer layout classes are too noisy.
fn in_boilerplate(el: &ElementRef<'_>) -> bool {
    looks_like_boilerplate(el)
        || el
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| looks_like_boilerplate(&p))
}

fn link_density(el: &ElementRef<'_>) -> f64 {
    let total = char_len(&element_text(el));
    if total == 0 {
        return 1.0;
    }
    let linked: usize = el.select(&LINK).map(|a| char_len(&element_text(&a))).sum();
    (linked as f64 / total as f64).min(1.0)
}

/// Paragraphs under `container` that are long enough and not page chrome.
fn paragraphs_within(container: &ElementRef<'_>, min_paragraph_chars: usize) -> Vec<String> {
    container
        .select(&PARAGRAPH)
        .filter(|p| !in_boilerplate(p))
        .map(|p| element_text(&p))
        .filter(|t| char_len(t) >= min_paragraph_chars)
        .collect()
}

/// Title and content from explicit CSS selectors.
///
/// Content is the paragraphs of the first matching container, or its full text
/// when it has no `<p>` children.
pub fn by_selectors(
    document: &Html,
    title_selector: &str,
    content_selector: &str,
) -> (Option<String>, String) {
    let title = Selector::parse(title_selector).ok().and_then(|sel| {
        document
            .select(&sel)
            .map(|el| element_text(&el))
            .find(|t| !t.is_empty())
    });

    let Ok(content_sel) = Selector::parse(content_selector) else {
        return (title, String::new());
    };
    let Some(container) = document.select(&content_sel).next() else {
        return (title, String::new());
    };

    let paragraphs: Vec<String> = container
        .select(&PARAGRAPH)
        .map(|p| element_text(&p))
        .filter(|t| !t.is_empty())
        .collect();
    let content = if paragraphs.is_empty() {
        element_text(&container)
    } else {
        paragraphs.join("\n\n")
    };
    (title, content)
}

/// Content-density scoring.
///
/// Each qualifying paragraph scores its parent fully and its grandparent by
/// half; the best node, discounted by link density, supplies the paragraphs.
pub fn by_density(document: &Html, min_paragraph_chars: usize) -> String {
    let mut scores = HashMap::new();

    for p in document.select(&PARAGRAPH) {
        if in_boilerplate(&p) {
            continue;
        }
        let text = element_text(&p);
        let len = char_len(&text);
        if len < min_paragraph_chars {
            continue;
        }
        let score = 1.0 + text.matches(',').count() as f64 + (len as f64 / 100.0).min(3.0);
        if let Some(parent) = p.parent() {
            *scores.entry(parent.id()).or_insert(0.0) += score;
            if let Some(grand) = parent.parent() {
                *scores.entry(grand.id()).or_insert(0.0) += score / 2.0;
            }
        }
    }

    let best = scores
        .into_iter()
        .filter_map(|(id, score)| {
            let el = ElementRef::wrap(document.tree.get(id)?)?;
            let adjusted = score * (1.0 - link_density(&el));
            Some((el, adjusted))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((el, _)) => paragraphs_within(&el, min_paragraph_chars).join("\n\n"),
        None => String::new(),
    }
}

/// The container with the most paragraph-like direct children.
pub fn by_structure(document: &Html, min_paragraph_chars: usize) -> String {
    let mut best: Vec<String> = Vec::new();

    for container in document.select(&CONTAINERS) {
        let paragraphs: Vec<String> = container
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "p")
            .map(|p| element_text(&p))
            .filter(|t| char_len(t) > min_paragraph_chars)
            .collect();
        if paragraphs.len() > best.len() {
            best = paragraphs;
        }
    }

    best.join("\n\n")
}

/// The longest run of text not interrupted by a block-level element.
pub fn longest_block(document: &Html) -> String {
    let mut longest = String::new();
    let mut longest_len = 0;

    for block in document.select(&BLOCKS) {
        let mut run = String::new();
        let mut flush = |run: &mut String| {
            let text = clean_text(run);
            let len = char_len(&text);
            if len > longest_len {
                longest_len = len;
                longest = text;
            }
            run.clear();
        };

        for child in block.children() {
            match child.value() {
                Node::Text(t) => run.push_str(&t.text),
                Node::Element(e) if e.name() == "br" => run.push(' '),
                Node::Element(e) if INLINE_TAGS.contains(&e.name()) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        run.push_str(&el.text().collect::<String>());
                    }
                }
                Node::Element(_) => flush(&mut run),
                _ => {}
            }
        }
        flush(&mut run);
    }

    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(n: usize) -> String {
        format!(
            "<p>Đây là đoạn văn số {n}, có đủ độ dài để được tính là một đoạn văn thật sự trong bài báo.</p>"
        )
    }

    #[test]
    fn test_page_title_prefers_og_title() {
        let html = Html::parse_document(
            r#"<html><head><title>Site | Page</title>
            <meta property="og:title" content="  Open Graph Title "></head>
            <body><h1>Heading</h1></body></html>"#,
        );
        assert_eq!(page_title(&html).as_deref(), Some("Open Graph Title"));
    }

    #[test]
    fn test_page_title_falls_back_to_h1_then_title() {
        let html = Html::parse_document("<html><head><title>Doc</title></head><body><h1>Head</h1></body></html>");
        assert_eq!(page_title(&html).as_deref(), Some("Head"));
        let html = Html::parse_document("<html><head><title>Doc</title></head><body></body></html>");
        assert_eq!(page_title(&html).as_deref(), Some("Doc"));
        let html = Html::parse_document("<html><body></body></html>");
        assert_eq!(page_title(&html), None);
    }

    #[test]
    fn test_by_selectors() {
        let html = Html::parse_document(
            r#"<h1 class="headline--lite">Breaking</h1>
            <div class="article--lite"><p>One.</p><p></p><p>Two.</p></div>"#,
        );
        let (title, content) = by_selectors(&html, ".headline--lite", ".article--lite");
        assert_eq!(title.as_deref(), Some("Breaking"));
        assert_eq!(content, "One.\n\nTwo.");
    }

    #[test]
    fn test_by_selectors_without_paragraphs_uses_container_text() {
        let html = Html::parse_document(r#"<div class="body">Plain   text body</div>"#);
        let (title, content) = by_selectors(&html, "h1", ".body");
        assert!(title.is_none());
        assert_eq!(content, "Plain text body");
    }

    #[test]
    fn test_by_selectors_invalid_selector_is_a_miss() {
        let html = Html::parse_document("<p>text</p>");
        let (_, content) = by_selectors(&html, "h1", "[[[");
        assert!(content.is_empty());
    }

    #[test]
    fn test_by_density_picks_article_over_navigation() {
        let body: String = (0..5).map(para).collect();
        let html = Html::parse_document(&format!(
            r#"<html><body>
            <div class="menu"><p><a href="/a">Trang chủ thời sự thế giới kinh doanh giải trí</a></p></div>
            <div class="content"><div class="article">{body}</div></div>
            <div class="footer"><p>Bản quyền thuộc về tòa soạn, mọi hình thức sao chép đều bị cấm.</p></div>
            </body></html>"#
        ));
        let content = by_density(&html, 30);
        assert!(content.contains("đoạn văn số 0"));
        assert!(content.contains("đoạn văn số 4"));
        assert!(!content.contains("Trang chủ"));
        assert!(!content.contains("Bản quyền"));
    }

    #[test]
    fn test_by_density_empty_document() {
        let html = Html::parse_document("<html><body></body></html>");
        assert!(by_density(&html, 30).is_empty());
    }

    #[test]
    fn test_by_structure_counts_direct_paragraph_children() {
        let html = Html::parse_document(&format!(
            r#"<div id="a">{}</div><div id="b">{}{}{}</div>"#,
            para(1),
            para(2),
            para(3),
            para(4)
        ));
        let content = by_structure(&html, 30);
        assert!(!content.contains("số 1,"));
        assert!(content.contains("số 2,"));
        assert!(content.contains("số 4,"));
    }

    #[test]
    fn test_by_structure_ignores_short_paragraphs() {
        let html = Html::parse_document("<div><p>short</p><p>tiny</p></div>");
        assert!(by_structure(&html, 30).is_empty());
    }

    #[test]
    fn test_longest_block_joins_inline_text() {
        let html = Html::parse_document(
            r#"<div>short</div>
            <div>Một khối văn bản <b>dài</b> không có thẻ p,<br>nhưng vẫn là nội dung chính của trang.<div>tail</div></div>"#,
        );
        let block = longest_block(&html);
        assert!(block.starts_with("Một khối văn bản dài"));
        assert!(block.contains("nội dung chính"));
        assert!(!block.contains("tail"));
    }
}
