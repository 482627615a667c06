//! Citation reconstruction.
//!
//! Turns a scored passage into a [`Citation`]: the page list collapsed into
//! a human-readable reference ("Pages 12-14, 16"), a confidence tier, and
//! truncated preview/excerpt text.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RetrievalConfig;
use crate::index::ScoredPassage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        })
    }
}

/// A passage presented for grounding, with everything needed to cite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub document: String,
    pub filename: String,
    pub page_reference: String,
    pub pages: Vec<u32>,
    pub primary_page: u32,
    pub relevance_score: f32,
    pub confidence: Confidence,
    pub passage_id: String,
    pub preview: String,
    pub excerpt: String,
    pub full_text: String,
    pub word_count: usize,
    pub char_count: usize,
}

/// Thresholds and lengths used to render citations.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationStyle {
    pub high_confidence: f32,
    pub medium_confidence: f32,
    pub preview_chars: usize,
    pub excerpt_chars: usize,
}

impl Default for CitationStyle {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for CitationStyle {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            high_confidence: config.high_confidence,
            medium_confidence: config.medium_confidence,
            preview_chars: config.preview_chars,
            excerpt_chars: config.excerpt_chars,
        }
    }
}

impl CitationStyle {
    /// Strictly above `high` is High, strictly above `medium` is Medium.
    pub fn confidence(&self, score: f32) -> Confidence {
        if score > self.high_confidence {
            Confidence::High
        } else if score > self.medium_confidence {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn cite(&self, hit: &ScoredPassage<'_>) -> Citation {
        let p = hit.passage;
        let pages = p.page_numbers();
        Citation {
            document: p.document.title.clone(),
            filename: p.document.filename.clone(),
            page_reference: page_reference(&pages),
            pages,
            primary_page: p.primary_page,
            relevance_score: hit.similarity,
            confidence: self.confidence(hit.similarity),
            passage_id: p.id.clone(),
            preview: truncate_at_word(&p.text, self.preview_chars),
            excerpt: truncate_at_word(&p.text, self.excerpt_chars),
            full_text: p.text.clone(),
            word_count: p.word_count,
            char_count: p.char_count,
        }
    }
}

/// Collapse page numbers into inclusive runs: `[3, 4, 5, 9]` → `[(3, 5), (9, 9)]`.
/// Input order and duplicates do not matter.
pub fn collapse_ranges(pages: &[u32]) -> Vec<(u32, u32)> {
    let mut sorted = pages.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<(u32, u32)> = Vec::new();
    for page in sorted {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == page => *end = page,
            _ => runs.push((page, page)),
        }
    }
    runs
}

/// "Page 7", "Pages 3-5, 9", or "Page unknown" for an empty list.
pub fn page_reference(pages: &[u32]) -> String {
    let runs = collapse_ranges(pages);
    match runs.as_slice() {
        [] => "Page unknown".to_string(),
        [(a, b)] if a == b => format!("Page {}", a),
        _ => {
            let parts: Vec<String> = runs
                .iter()
                .map(|(a, b)| {
                    if a == b {
                        a.to_string()
                    } else {
                        format!("{}-{}", a, b)
                    }
                })
                .collect();
            format!("Pages {}", parts.join(", "))
        }
    }
}

/// Shorten `text` to at most `max_chars` chars plus `...`, cutting at the
/// last whitespace when one falls in the second half of the limit.
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(pos) if head[..pos].chars().count() > max_chars / 2 => &head[..pos],
        _ => head.as_str(),
    };
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::passage;

    #[test]
    fn test_page_reference() {
        assert_eq!(page_reference(&[3, 4, 5, 9]), "Pages 3-5, 9");
        assert_eq!(page_reference(&[7]), "Page 7");
        assert_eq!(page_reference(&[12, 13, 14, 16]), "Pages 12-14, 16");
        assert_eq!(page_reference(&[2, 1]), "Pages 1-2");
        assert_eq!(page_reference(&[5, 5]), "Page 5");
        assert_eq!(page_reference(&[]), "Page unknown");
    }

    #[test]
    fn test_collapse_ranges() {
        assert_eq!(collapse_ranges(&[9, 3, 5, 4]), vec![(3, 5), (9, 9)]);
        assert_eq!(collapse_ranges(&[1, 3, 5]), vec![(1, 1), (3, 3), (5, 5)]);
    }

    #[test]
    fn test_confidence_tiers() {
        let style = CitationStyle::default();
        assert_eq!(style.confidence(0.81), Confidence::High);
        assert_eq!(style.confidence(0.8), Confidence::Medium);
        assert_eq!(style.confidence(0.51), Confidence::Medium);
        assert_eq!(style.confidence(0.5), Confidence::Low);
        assert_eq!(style.confidence(0.1), Confidence::Low);
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("short text", 200), "short text");
        assert_eq!(
            truncate_at_word("the quick brown fox jumps", 12),
            "the quick..."
        );
        assert_eq!(truncate_at_word("abcdefghijklmnop", 5), "abcde...");
        let long = "ज्ञान ".repeat(100);
        let t = truncate_at_word(&long, 50);
        assert!(t.ends_with("..."));
        assert!(t.chars().count() <= 53);
    }

    #[test]
    fn test_cite() {
        let p = passage("rights.pdf", 3, 12, &"Maternity benefit applies. ".repeat(30));
        let hit = ScoredPassage {
            passage: &p,
            similarity: 0.62,
        };
        let c = CitationStyle::default().cite(&hit);
        assert_eq!(c.document, "rights");
        assert_eq!(c.page_reference, "Page 12");
        assert_eq!(c.primary_page, 12);
        assert_eq!(c.confidence, Confidence::Medium);
        assert!(c.preview.ends_with("..."));
        assert!(c.preview.chars().count() <= 203);
        assert!(c.excerpt.chars().count() <= 503);
        assert_eq!(c.full_text, p.text);
        assert_eq!(c.passage_id, p.id);
    }
}
