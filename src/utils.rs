//! Utility functions for logging, text cleanup, keyword folding and domain matching.
//!
//! This module provides helper functions used throughout the pipeline:
//! - String truncation for log output
//! - Whitespace normalisation for extracted text
//! - ASCII folding of Vietnamese keywords
//! - Host extraction and domain matching for blacklists and extraction rules

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended. Truncation never splits a UTF-8 character.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse runs of whitespace (including non-breaking spaces) into single spaces.
pub fn clean_text(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Length in characters, which is what every content threshold is measured in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Vietnamese letters and the ASCII letter they fold to.
///
/// Unicode decomposition alone does not handle `đ`/`Đ`, so the table is explicit.
const FOLD_TABLE: &[(&str, char)] = &[
    ("àáạảãâầấậẩẫăằắặẳẵ", 'a'),
    ("ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴ", 'A'),
    ("èéẹẻẽêềếệểễ", 'e'),
    ("ÈÉẸẺẼÊỀẾỆỂỄ", 'E'),
    ("ìíịỉĩ", 'i'),
    ("ÌÍỊỈĨ", 'I'),
    ("òóọỏõôồốộổỗơờớợởỡ", 'o'),
    ("ÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠ", 'O'),
    ("ùúụủũưừứựửữ", 'u'),
    ("ÙÚỤỦŨƯỪỨỰỬỮ", 'U'),
    ("ỳýỵỷỹ", 'y'),
    ("ỲÝỴỶỸ", 'Y'),
    ("đ", 'd'),
    ("Đ", 'D'),
];

static FOLD_MAP: Lazy<HashMap<char, char>> = Lazy::new(|| {
    FOLD_TABLE
        .iter()
        .flat_map(|(chars, ascii)| chars.chars().map(move |c| (c, *ascii)))
        .collect()
});

/// Replace accented Vietnamese letters with their ASCII base letter.
///
/// Characters outside the table are kept as-is, so folding is deterministic
/// and only ever touches letters it knows about.
pub fn fold_ascii(s: &str) -> String {
    s.chars()
        .map(|c| FOLD_MAP.get(&c).copied().unwrap_or(c))
        .collect()
}

/// Lowercased host of `url` without a leading `www.`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// True if `host` is `domain` or one of its subdomains.
pub fn domain_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches("www.").to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "Việt Nam ".repeat(20);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("Việ…"));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a \n\t b\u{a0}c  "), "a b c");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_fold_ascii_vietnamese() {
        assert_eq!(fold_ascii("Việt Nam"), "Viet Nam");
        assert_eq!(fold_ascii("đường sắt tốc độ cao"), "duong sat toc do cao");
        assert_eq!(fold_ascii("ĐÀ NẴNG"), "DA NANG");
        assert_eq!(fold_ascii("Hồ Chí Minh"), "Ho Chi Minh");
    }

    #[test]
    fn test_fold_ascii_leaves_ascii_alone() {
        assert_eq!(fold_ascii("test keyword 2025"), "test keyword 2025");
    }

    #[test]
    fn test_fold_ascii_is_deterministic() {
        let once = fold_ascii("giá vàng hôm nay");
        assert_eq!(once, "gia vang hom nay");
        assert_eq!(fold_ascii(&once), once);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://www.VnExpress.net/abc-123.html"),
            Some("vnexpress.net".to_string())
        );
        assert_eq!(host_of("https://lite.cnn.com/x"), Some("lite.cnn.com".to_string()));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn test_domain_matches() {
        assert!(domain_matches("youtube.com", "youtube.com"));
        assert!(domain_matches("m.youtube.com", "youtube.com"));
        assert!(domain_matches("m.youtube.com", "www.youtube.com"));
        assert!(!domain_matches("notyoutube.com", "youtube.com"));
        assert!(!domain_matches("youtube.com", ""));
    }
}
