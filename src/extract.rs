//! Per-page PDF text extraction.
//!
//! Extraction runs an ordered list of [`ExtractionStrategy`] implementations
//! and keeps the first one that yields at least one non-blank page:
//!
//! | Order | Strategy | Backend |
//! |-------|----------|---------|
//! | 1 | [`PdfExtractStrategy`] | `pdf_extract::extract_text_from_mem_by_pages` |
//! | 2 | [`LopdfStrategy`] | `lopdf::Document::extract_text`, one page at a time |
//!
//! Strategies never panic outward: a panicking backend is reported as a
//! strategy failure. Each page is cleaned with [`clean_text`]; pages that
//! are blank before or after cleaning are dropped. Document metadata comes
//! from the PDF Info dictionary, falling back to the filename stem.

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, warn};

use crate::clean::clean_text;
use crate::error::ExtractError;
use crate::models::{DocumentMetadata, ExtractionMethod, PageRecord};

/// One way of turning PDF bytes into per-page text.
pub trait ExtractionStrategy: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    /// Raw text for every physical page, in page order. Blank pages are
    /// included so that indices map to 1-based page numbers.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError>;
}

pub struct PdfExtractStrategy;

impl ExtractionStrategy for PdfExtractStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PdfExtract
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        guarded(self.method(), || {
            pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())
        })
    }
}

pub struct LopdfStrategy;

impl ExtractionStrategy for LopdfStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Lopdf
    }

    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        guarded(self.method(), || {
            let doc = Document::load_mem(bytes).map_err(|e| e.to_string())?;
            let pages = doc.get_pages();
            let mut out = Vec::with_capacity(pages.len());
            for page_number in pages.keys() {
                // An unreadable page becomes blank rather than failing the document.
                out.push(doc.extract_text(&[*page_number]).unwrap_or_default());
            }
            Ok(out)
        })
    }
}

fn guarded<F>(method: ExtractionMethod, f: F) -> Result<Vec<String>, ExtractError>
where
    F: FnOnce() -> Result<Vec<String>, String>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(message)) => Err(ExtractError::Strategy { method, message }),
        Err(_) => Err(ExtractError::Strategy {
            method,
            message: "backend panicked".to_string(),
        }),
    }
}

/// Result of extracting one file. `pages` is empty when every strategy failed.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub metadata: DocumentMetadata,
    pub pages: Vec<PageRecord>,
}

/// Runs the strategy chain over files.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_strategies(vec![Box::new(PdfExtractStrategy), Box::new(LopdfStrategy)])
    }
}

impl Extractor {
    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extract metadata and cleaned pages from a PDF on disk.
    ///
    /// Never fails: unreadable files and exhausted strategies produce an
    /// [`Extraction`] with no pages, and the caller decides to skip it.
    pub fn extract(&self, path: &Path) -> Extraction {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.clone());

        let (file_size, modified_at) = match std::fs::metadata(path) {
            Ok(m) => (m.len(), m.modified().ok().map(DateTime::<Utc>::from)),
            Err(_) => (0, None),
        };

        let mut metadata = DocumentMetadata {
            filename,
            filepath: path.to_path_buf(),
            title: stem.clone(),
            author: None,
            subject: None,
            creator: None,
            page_count: 0,
            file_size,
            modified_at,
        };

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(source) => {
                let err = ExtractError::Io {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                return Extraction {
                    metadata,
                    pages: Vec::new(),
                };
            }
        };

        let (pages, physical_pages) = self.extract_bytes(&bytes, path);

        match read_info(&bytes) {
            Some(info) => {
                if let Some(title) = info.title {
                    metadata.title = title;
                }
                metadata.author = info.author;
                metadata.subject = info.subject;
                metadata.creator = info.creator;
                metadata.page_count = info.page_count;
            }
            None => debug!("{}: no readable Info dictionary", path.display()),
        }
        if metadata.page_count == 0 {
            metadata.page_count = physical_pages;
        }

        Extraction { metadata, pages }
    }

    /// Returns cleaned non-blank pages plus the physical page count reported
    /// by the winning strategy.
    fn extract_bytes(&self, bytes: &[u8], path: &Path) -> (Vec<PageRecord>, usize) {
        for strategy in &self.strategies {
            let method = strategy.method();
            match strategy.extract_pages(bytes) {
                Ok(raw_pages) => {
                    let physical = raw_pages.len();
                    let pages = to_page_records(raw_pages, method);
                    if !pages.is_empty() {
                        debug!(
                            "{}: {} of {} pages extracted with {}",
                            path.display(),
                            pages.len(),
                            physical,
                            method
                        );
                        return (pages, physical);
                    }
                    debug!("{}: {} produced only blank pages", path.display(), method);
                }
                Err(e) => debug!("{}: {}", path.display(), e),
            }
        }
        warn!(
            "{}: no extraction strategy produced text; skipping",
            path.display()
        );
        (Vec::new(), 0)
    }
}

fn to_page_records(raw_pages: Vec<String>, method: ExtractionMethod) -> Vec<PageRecord> {
    raw_pages
        .into_iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            if raw.trim().is_empty() {
                return None;
            }
            let text = clean_text(&raw);
            if text.is_empty() {
                return None;
            }
            Some(PageRecord {
                page_number: (i + 1) as u32,
                text,
                char_count: raw.chars().count(),
                method,
            })
        })
        .collect()
}

// ============ Info dictionary ============

#[derive(Debug, Default, PartialEq)]
struct PdfInfo {
    title: Option<String>,
    author: Option<String>,
    subject: Option<String>,
    creator: Option<String>,
    page_count: usize,
}

fn read_info(bytes: &[u8]) -> Option<PdfInfo> {
    catch_unwind(AssertUnwindSafe(|| {
        let doc = Document::load_mem(bytes).ok()?;
        let mut info = PdfInfo {
            page_count: doc.get_pages().len(),
            ..PdfInfo::default()
        };
        if let Some(dict) = info_dictionary(&doc) {
            info.title = info_string(&doc, dict, b"Title");
            info.author = info_string(&doc, dict, b"Author");
            info.subject = info_string(&doc, dict, b"Subject");
            info.creator = info_string(&doc, dict, b"Creator");
        }
        Some(info)
    }))
    .ok()
    .flatten()
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    let mut value = dict.get(key).ok()?;
    if let Object::Reference(id) = value {
        value = doc.get_object(*id).ok()?;
    }
    match value {
        Object::String(bytes, _) => {
            let decoded = decode_pdf_string(bytes);
            let trimmed = decoded.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// Decodes a PDF text string: UTF-16BE when BOM-prefixed, UTF-8 when valid,
/// otherwise byte-wise as PDFDocEncoding (Latin-1 for printable ASCII+).
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim_start_matches('\u{feff}').to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
