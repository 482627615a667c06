//! Page text cleaning.
//!
//! Normalizes whitespace and strips boilerplate that PDF extraction drags in:
//! running "page N of M" footers, copyright notices, bare page numbers, and
//! raw URLs (replaced by a `[URL]` placeholder).

use regex::Regex;
use std::sync::LazyLock;

static INLINE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());
static PAGE_OF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)page\s+\d+\s+of\s+\d+").unwrap());
static COPYRIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:©|\(c\))[^\n]*?\d{4}[^\n]*").unwrap());
static RIGHTS_RESERVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)all rights reserved[^\n]*").unwrap());
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static PAGE_NUMBER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d{1,4}[ \t]*(?:\n|$)").unwrap());
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Placeholder substituted for raw URLs.
pub const URL_PLACEHOLDER: &str = "[URL]";

/// Clean one page of extracted text. Returns an empty string for pages that
/// contain nothing but boilerplate.
pub fn clean_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace(['\r', '\x0c'], "\n");
    let text = INLINE_WS.replace_all(&text, " ");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    let text = PAGE_OF.replace_all(&text, "");
    let text = COPYRIGHT.replace_all(&text, "");
    let text = RIGHTS_RESERVED.replace_all(&text, "");
    let text = URL.replace_all(&text, URL_PLACEHOLDER);
    let text = PAGE_NUMBER_LINE.replace_all(&text, "");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
