//! Page-aware sliding-window chunker.
//!
//! Concatenates the pages of one document into a single stream (pages
//! joined by [`PAGE_SEPARATOR`]) while recording each page's character
//! range in a boundary table. A window of `chunk_size` characters then
//! slides over the stream with `chunk_overlap` characters of overlap. Cuts
//! snap to the nearest sentence terminator, or failing that the nearest
//! paragraph break, within a bounded lookahead.
//!
//! Every [`Passage`] records the pages its span overlaps, so citations can
//! name exact pages even when a passage straddles a page break.
//!
//! All offsets are char indices, not byte offsets.

use crate::config::ChunkingConfig;
use crate::models::{DocumentMetadata, DocumentRef, PageRecord, PageSpan, Passage};

/// Inserted between consecutive pages in the document stream.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Character range `[start, end)` a page occupies in the document stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBoundary {
    pub page_number: u32,
    pub start: usize,
    pub end: usize,
}

/// The concatenated text of one document plus its page boundary table.
#[derive(Debug, Clone)]
pub struct DocumentStream {
    chars: Vec<char>,
    boundaries: Vec<PageBoundary>,
}

impl DocumentStream {
    pub fn from_pages(pages: &[PageRecord]) -> Self {
        let mut chars = Vec::new();
        let mut boundaries = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                chars.extend(PAGE_SEPARATOR.chars());
            }
            let start = chars.len();
            chars.extend(page.text.chars());
            boundaries.push(PageBoundary {
                page_number: page.page_number,
                start,
                end: chars.len(),
            });
        }
        Self { chars, boundaries }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn boundaries(&self) -> &[PageBoundary] {
        &self.boundaries
    }

    pub fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Every page overlapping `[start, end)` by at least one char, in order.
    pub fn attribute(&self, start: usize, end: usize) -> Vec<PageSpan> {
        self.boundaries
            .iter()
            .filter_map(|b| {
                let lo = start.max(b.start);
                let hi = end.min(b.end);
                (hi > lo).then(|| PageSpan {
                    page_number: b.page_number,
                    overlap_chars: hi - lo,
                })
            })
            .collect()
    }
}

/// Split one document's pages into overlapping, page-attributed passages.
pub fn chunk_document(
    pages: &[PageRecord],
    metadata: &DocumentMetadata,
    config: &ChunkingConfig,
) -> Vec<Passage> {
    let stream = DocumentStream::from_pages(pages);
    chunk_stream(&stream, DocumentRef::from(metadata), config)
}

pub fn chunk_stream(
    stream: &DocumentStream,
    document: DocumentRef,
    config: &ChunkingConfig,
) -> Vec<Passage> {
    let len = stream.len();
    let mut passages: Vec<Passage> = Vec::new();
    let mut cursor = 0;

    while cursor < len {
        let mut cut = find_cut(&stream.chars, cursor, config);
        let (mut start, mut end) = trim_span(&stream.chars, cursor, cut);
        // A short window is extended into the next one rather than dropped.
        while end - start < config.min_chunk_chars && cut < len {
            cut = find_cut(&stream.chars, cut, config);
            (start, end) = trim_span(&stream.chars, cursor, cut);
        }
        let too_short = end - start < config.min_chunk_chars;

        if too_short {
            // Only the tail can still be short; fold it into the previous passage.
            if end > start {
                if let Some(last) = passages.pop() {
                    let merged = make_passage(stream, &document, last.passage_index, last.start, end)
                        .unwrap_or(last);
                    passages.push(merged);
                }
            }
        } else if passages.last().map_or(true, |p| start > p.start) {
            if let Some(p) = make_passage(stream, &document, passages.len(), start, end) {
                passages.push(p);
            }
        }

        if cut >= len {
            break;
        }
        cursor = cut.saturating_sub(config.chunk_overlap).max(cursor + 1);
    }

    passages
}

fn make_passage(
    stream: &DocumentStream,
    document: &DocumentRef,
    index: usize,
    start: usize,
    end: usize,
) -> Option<Passage> {
    Passage::new(
        document.clone(),
        index,
        stream.slice(start, end),
        start,
        end,
        stream.attribute(start, end),
    )
}

/// Where the window starting at `start` ends. Always `> start`.
fn find_cut(chars: &[char], start: usize, config: &ChunkingConfig) -> usize {
    let len = chars.len();
    let naive = (start + config.chunk_size).min(len);
    if naive >= len || is_sentence_end(chars, naive - 1) {
        return naive;
    }

    let floor = start + (config.chunk_size / 2).max(config.min_chunk_chars);

    let sentence_limit = (naive + config.sentence_lookahead).min(len);
    let sentence_cuts = (floor..sentence_limit)
        .filter(|&i| is_sentence_end(chars, i))
        .map(|i| i + 1);
    if let Some(cut) = nearest(sentence_cuts, naive) {
        return cut;
    }

    let paragraph_limit = (naive + config.paragraph_lookahead).min(len);
    let paragraph_cuts = (floor..paragraph_limit.saturating_sub(1))
        .filter(|&i| chars[i] == '\n' && chars[i + 1] == '\n')
        .map(|i| i + 2);
    if let Some(cut) = nearest(paragraph_cuts, naive) {
        return cut;
    }

    naive
}

/// The candidate closest to `target`; the earlier one on ties.
fn nearest(candidates: impl Iterator<Item = usize>, target: usize) -> Option<usize> {
    candidates.min_by_key(|&c| c.abs_diff(target))
}

fn is_sentence_end(chars: &[char], i: usize) -> bool {
    matches!(chars[i], '.' | '!' | '?') && chars.get(i + 1).map_or(true, |c| c.is_whitespace())
}

fn trim_span(chars: &[char], mut start: usize, mut end: usize) -> (usize, usize) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionMethod;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn page(n: u32, text: &str) -> PageRecord {
        PageRecord {
            page_number: n,
            text: text.to_string(),
            char_count: text.chars().count(),
            method: ExtractionMethod::PdfExtract,
        }
    }

    fn meta(pages: usize) -> DocumentMetadata {
        DocumentMetadata {
            filename: "guide.pdf".to_string(),
            filepath: PathBuf::from("/kb/guide.pdf"),
            title: "Guide".to_string(),
            author: None,
            subject: None,
            creator: None,
            page_count: pages,
            file_size: 0,
            modified_at: None,
        }
    }

    /// Prose of roughly `len` chars with a sentence end every eight words.
    fn prose(len: usize, word: &str) -> String {
        let mut out = String::new();
        let mut n = 0;
        while out.chars().count() < len {
            out.push_str(word);
            n += 1;
            out.push_str(if n % 8 == 0 { ". " } else { " " });
        }
        out.chars().take(len).collect::<String>().trim().to_string()
    }

    #[test]
    fn test_two_page_scenario() {
        let p1 = prose(700, "nutrition");
        let p2 = prose(50, "folate");
        let pages = vec![page(1, &p1), page(2, &p2)];
        let passages = chunk_document(&pages, &meta(2), &ChunkingConfig::default());

        assert!(passages.len() >= 2, "got {} passages", passages.len());
        assert_eq!(passages[0].primary_page, 1);
        assert_eq!(passages[0].page_numbers(), vec![1]);

        let last = passages.last().unwrap();
        assert!(last.page_numbers().contains(&2));
        assert!(last.page_numbers().contains(&1));
        assert!(last.text.contains("nutrition"));
        assert!(last.text.contains("folate"));
    }

    #[test]
    fn test_starts_strictly_increase_and_overlap_bounded() {
        let pages: Vec<PageRecord> = (1..=5)
            .map(|n| page(n, &prose(450, "hydration")))
            .collect();
        let config = ChunkingConfig::default();
        let passages = chunk_document(&pages, &meta(5), &config);
        assert!(passages.len() > 3);
        for pair in passages.windows(2) {
            assert!(pair[1].start > pair[0].start);
            let overlap = pair[0].end.saturating_sub(pair[1].start);
            assert!(overlap <= config.chunk_overlap, "overlap {}", overlap);
        }
    }

    #[test]
    fn test_span_maps_back_to_stream() {
        let pages = vec![page(1, &prose(900, "consent")), page(3, &prose(400, "rights"))];
        let stream = DocumentStream::from_pages(&pages);
        let passages = chunk_stream(&stream, DocumentRef::from(&meta(3)), &ChunkingConfig::default());
        for p in &passages {
            assert_eq!(stream.slice(p.start, p.end), p.text);
            assert!(!p.pages.is_empty());
            assert_eq!(p.char_count, p.text.chars().count());
        }
    }

    #[test]
    fn test_every_page_is_attributed() {
        let pages = vec![
            page(1, &prose(300, "alpha")),
            page(2, "Short page with one line."),
            page(4, &prose(1200, "gamma")),
            page(5, "Tiny."),
        ];
        let passages = chunk_document(&pages, &meta(5), &ChunkingConfig::default());
        let covered: BTreeSet<u32> = passages.iter().flat_map(|p| p.page_numbers()).collect();
        assert_eq!(covered, BTreeSet::from([1, 2, 4, 5]));
    }

    #[test]
    fn test_union_of_spans_covers_stream() {
        let pages = vec![page(1, &prose(1000, "sleep")), page(2, &prose(333, "anxiety"))];
        let stream = DocumentStream::from_pages(&pages);
        let passages = chunk_stream(&stream, DocumentRef::from(&meta(2)), &ChunkingConfig::default());
        assert_eq!(passages.first().unwrap().start, 0);
        assert_eq!(passages.last().unwrap().end, stream.len());
        for pair in passages.windows(2) {
            let gap = stream.slice(pair[0].end.min(pair[1].start), pair[1].start);
            assert!(pair[1].start <= pair[0].end || gap.trim().is_empty());
        }
    }

    #[test]
    fn test_cuts_prefer_sentence_ends() {
        let pages = vec![page(1, &prose(2000, "wellbeing"))];
        let passages = chunk_document(&pages, &meta(1), &ChunkingConfig::default());
        for p in &passages[..passages.len() - 1] {
            assert!(p.text.ends_with('.'), "passage ends with {:?}", p.text.chars().last());
        }
    }

    #[test]
    fn test_short_document_is_single_passage() {
        let pages = vec![page(1, "A single page that is long enough to keep as a passage.")];
        let passages = chunk_document(&pages, &meta(1), &ChunkingConfig::default());
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].passage_index, 0);
    }

    #[test]
    fn test_too_short_document_yields_nothing() {
        let passages = chunk_document(&[page(1, "Too short.")], &meta(1), &ChunkingConfig::default());
        assert!(passages.is_empty());
        assert!(chunk_document(&[], &meta(0), &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_multibyte_text_is_char_indexed() {
        let text = "महिला स्वास्थ्य और पोषण। ".repeat(60);
        let pages = vec![page(1, text.trim())];
        let stream = DocumentStream::from_pages(&pages);
        let passages = chunk_stream(&stream, DocumentRef::from(&meta(1)), &ChunkingConfig::default());
        assert!(passages.len() > 1);
        for p in &passages {
            assert_eq!(stream.slice(p.start, p.end), p.text);
        }
    }

    #[test]
    fn test_attribute_skips_pages_outside_span() {
        let pages = vec![page(1, &"a".repeat(40)), page(2, &"b".repeat(40)), page(3, &"c".repeat(40))];
        let stream = DocumentStream::from_pages(&pages);

        let first = stream.attribute(0, 10);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].page_number, 1);
        assert_eq!(first[0].overlap_chars, 10);

        let spanning = stream.attribute(30, 90);
        let overlaps: Vec<(u32, usize)> = spanning
            .iter()
            .map(|s| (s.page_number, s.overlap_chars))
            .collect();
        assert_eq!(overlaps, vec![(1, 10), (2, 40), (3, 6)]);

        assert!(stream.attribute(40, 42).is_empty());
    }

    #[test]
    fn test_large_min_chunk_keeps_every_char() {
        let text = format!("{}. {}. {}", "a".repeat(51), "b".repeat(106), "c".repeat(200));
        let stream = DocumentStream::from_pages(&[page(1, &text)]);
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 20,
            min_chunk_chars: 90,
            ..ChunkingConfig::default()
        };
        let passages = chunk_stream(&stream, DocumentRef::from(&meta(1)), &config);

        assert_eq!(passages[0].start, 0);
        assert!(passages[0].text.starts_with('a'));
        let chars: Vec<char> = stream.text().chars().collect();
        for (i, c) in chars.iter().enumerate() {
            if !c.is_whitespace() {
                assert!(
                    passages.iter().any(|p| p.start <= i && i < p.end),
                    "char {} ({:?}) not covered",
                    i,
                    c
                );
            }
        }
        for p in &passages {
            assert!(p.char_count >= config.min_chunk_chars);
        }
    }

    #[test]
    fn test_deterministic() {
        let pages = vec![page(1, &prose(1500, "labour"))];
        let a = chunk_document(&pages, &meta(1), &ChunkingConfig::default());
        let b = chunk_document(&pages, &meta(1), &ChunkingConfig::default());
        assert_eq!(a, b);
    }
}
