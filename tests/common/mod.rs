//! Shared fixtures for integration tests: hand-built PDFs with one text
//! line per `Tj`, Helvetica in WinAnsiEncoding, and correct xref offsets.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// Build a PDF with one page per entry in `pages`; each page is a list of
/// text lines. An empty line list yields a page with no text. Lines must
/// not contain `(`, `)` or `\`.
pub fn pdf_with_pages(title: Option<&str>, pages: &[&[&str]]) -> Vec<u8> {
    let page_count = pages.len();
    let info_id = 4 + 2 * page_count;
    let mut offsets: Vec<usize> = Vec::new();
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            page_count
        )
        .as_bytes(),
    );

    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );

    for (i, lines) in pages.iter().enumerate() {
        let page_id = 4 + 2 * i;
        let content_id = page_id + 1;

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id, content_id
            )
            .as_bytes(),
        );

        let mut stream = String::from("BT /F1 11 Tf 72 720 Td\n");
        for (n, line) in lines.iter().enumerate() {
            if n > 0 {
                stream.push_str("0 -14 Td\n");
            }
            stream.push_str(&format!("({} ) Tj\n", line));
        }
        stream.push_str("ET");

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let mut size = 4 + 2 * page_count;
    if let Some(title) = title {
        offsets.push(out.len());
        out.extend_from_slice(
            format!("{} 0 obj << /Title ({}) >> endobj\n", info_id, title).as_bytes(),
        );
        size += 1;
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    let info = if title.is_some() {
        format!(" /Info {} 0 R", info_id)
    } else {
        String::new()
    };
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R{} >>\nstartxref\n{}\n%%EOF\n",
            size, info, xref_start
        )
        .as_bytes(),
    );
    out
}

pub const ANC_PAGE_ONE: &[&str] = &[
    "Antenatal care protects the health of mother and baby.",
    "Pregnant women should take iron and folic acid supplements daily.",
    "Iron and folic acid reduce the risk of maternal anaemia.",
    "Every pregnant woman needs at least eight antenatal contacts.",
    "Blood pressure should be measured at every antenatal visit.",
];

pub const ANC_PAGE_TWO: &[&str] = &[
    "Exclusive breastfeeding is recommended for the first six months.",
    "Breastfeeding should begin within one hour of birth.",
    "Mothers need support with positioning and attachment.",
    "Postnatal checks for the newborn happen within the first day.",
    "Danger signs after birth include fever and heavy bleeding.",
];

pub const RIGHTS_PAGE: &[&str] = &[
    "Domestic violence is punishable under the protection of women act.",
    "A protection officer helps survivors file a domestic incident report.",
    "Survivors may seek residence orders and monetary relief from court.",
    "Legal aid services are free for women seeking protection orders.",
];

/// The two-page antenatal guide used across tests.
pub fn anc_guide() -> Vec<u8> {
    pdf_with_pages(Some("Antenatal Care Guide"), &[ANC_PAGE_ONE, ANC_PAGE_TWO])
}

pub fn write(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}
