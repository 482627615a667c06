//! Core data models used throughout the knowledge base.
//!
//! These types represent the documents, pages, and passages that flow
//! through the ingestion pipeline and back out of the retriever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Identifies one source PDF. Created once per ingested file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub filepath: PathBuf,
    /// Embedded `/Title`, or the filename stem when absent or blank.
    pub title: String,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub page_count: usize,
    pub file_size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Which extraction strategy produced a page's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    PdfExtract,
    Lopdf,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::PdfExtract => "pdf-extract",
            ExtractionMethod::Lopdf => "lopdf",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One non-empty page of cleaned text. Consumed by the chunker only.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// 1-based physical page number.
    pub page_number: u32,
    pub text: String,
    /// Character count of the raw extracted page text, before cleaning.
    pub char_count: usize,
    pub method: ExtractionMethod,
}

/// The slice of [`DocumentMetadata`] that travels with every passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub title: String,
    pub filename: String,
    pub filepath: String,
    pub total_pages: usize,
}

impl From<&DocumentMetadata> for DocumentRef {
    fn from(meta: &DocumentMetadata) -> Self {
        Self {
            title: meta.title.clone(),
            filename: meta.filename.clone(),
            filepath: meta.filepath.display().to_string(),
            total_pages: meta.page_count,
        }
    }
}

/// A page attributed to a passage, with the number of characters they share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub page_number: u32,
    pub overlap_chars: usize,
}

/// The atomic retrievable unit.
///
/// `start..end` is a char range into the document stream built by the
/// chunker; the stream sliced at that range equals `text`. A passage always
/// references at least one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub document: DocumentRef,
    /// Attributed pages in page order.
    pub pages: Vec<PageSpan>,
    /// The page contributing the most characters (earliest page on ties).
    pub primary_page: u32,
    pub char_count: usize,
    pub word_count: usize,
    pub start: usize,
    pub end: usize,
    /// Position of this passage within its document.
    pub passage_index: usize,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Passage {
    /// Builds a passage, deriving counts, hash, primary page, and a stable id.
    ///
    /// Returns `None` when `pages` is empty.
    pub fn new(
        document: DocumentRef,
        passage_index: usize,
        text: String,
        start: usize,
        end: usize,
        pages: Vec<PageSpan>,
    ) -> Option<Self> {
        let mut primary = *pages.first()?;
        for span in &pages[1..] {
            if span.overlap_chars > primary.overlap_chars {
                primary = *span;
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        let id = Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("{}:{}:{}", document.filename, passage_index, hash).as_bytes(),
        )
        .to_string();

        Some(Self {
            id,
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
            document,
            primary_page: primary.page_number,
            pages,
            start,
            end,
            passage_index,
            hash,
        })
    }

    /// Page numbers attributed to this passage, in order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.page_number).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentRef {
        DocumentRef {
            title: "Antenatal Care".to_string(),
            filename: "anc.pdf".to_string(),
            filepath: "/kb/maaya/anc.pdf".to_string(),
            total_pages: 4,
        }
    }

    #[test]
    fn test_primary_page_is_largest_overlap() {
        let pages = vec![
            PageSpan { page_number: 2, overlap_chars: 40 },
            PageSpan { page_number: 3, overlap_chars: 300 },
            PageSpan { page_number: 4, overlap_chars: 10 },
        ];
        let p = Passage::new(doc(), 0, "some words here".to_string(), 0, 15, pages).unwrap();
        assert_eq!(p.primary_page, 3);
        assert_eq!(p.word_count, 3);
        assert_eq!(p.char_count, 15);
        assert_eq!(p.page_numbers(), vec![2, 3, 4]);
    }

    #[test]
    fn test_primary_page_ties_go_to_earliest() {
        let pages = vec![
            PageSpan { page_number: 5, overlap_chars: 20 },
            PageSpan { page_number: 6, overlap_chars: 20 },
        ];
        let p = Passage::new(doc(), 1, "x".repeat(40), 0, 40, pages).unwrap();
        assert_eq!(p.primary_page, 5);
    }

    #[test]
    fn test_passage_without_pages_is_rejected() {
        assert!(Passage::new(doc(), 0, "text".to_string(), 0, 4, Vec::new()).is_none());
    }

    #[test]
    fn test_ids_are_stable_across_rebuilds() {
        let pages = vec![PageSpan { page_number: 1, overlap_chars: 4 }];
        let a = Passage::new(doc(), 0, "text".to_string(), 0, 4, pages.clone()).unwrap();
        let b = Passage::new(doc(), 0, "text".to_string(), 0, 4, pages.clone()).unwrap();
        let c = Passage::new(doc(), 1, "text".to_string(), 0, 4, pages).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }
}
