//! # trialsage-pdf: PDF Loader Plugin
//!
//! This crate provides PDF text extraction for the `trialsage` ecosystem. It
//! implements the `DocumentLoader` trait so a front end can register it next
//! to the built-in text loaders, and offers the "Convert PDF to TXT" helper.

use pdf::content::{Op, TextDrawAdjusted};
use pdf::file::FileOptions;
use thiserror::Error;
use tracing::{info, instrument, warn};
use trialsage::{
    cleanup::{count_cid_codes, repair_text},
    DocumentFormat, DocumentLoader, LoadError,
};

/// More unreadable glyph codes than this after repair make a conversion useless.
pub const MAX_REMAINING_CID_CODES: usize = 10;

// --- Error Definitions ---

#[derive(Error, Debug)]
pub enum PdfLoadError {
    #[error("Failed to open PDF: {0}")]
    Open(String),
    #[error("No page of the PDF could be read. If it is a scanned document, please paste its text instead.")]
    NoReadablePages,
    #[error(
        "The PDF uses a font encoding that could not be decoded ({0} unreadable glyph codes remain).\n\
         Suggestions:\n\
         - Open the PDF in a viewer, copy the text and paste it into the text box.\n\
         - Export the PDF to plain text with another tool and upload the .txt file."
    )]
    TooManyCidCodes(usize),
}

impl From<PdfLoadError> for LoadError {
    fn from(err: PdfLoadError) -> Self {
        LoadError::Unreadable(err.to_string())
    }
}

// --- Core Extraction Logic ---

/// Extracts the raw text of each page. Pages that fail to decode are skipped.
///
/// Returns `(page_number, text)` pairs with 1-based page numbers.
pub fn extract_pages(pdf_data: &[u8]) -> Result<Vec<(u32, String)>, PdfLoadError> {
    let file = FileOptions::cached()
        .load(pdf_data)
        .map_err(|e| PdfLoadError::Open(e.to_string()))?;
    let resolver = file.resolver();
    let mut pages = Vec::new();
    let mut failed = 0;

    for page_num in 0..file.num_pages() {
        let page = match file.get_page(page_num) {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping PDF page {}: {}", page_num + 1, e);
                failed += 1;
                continue;
            }
        };
        let Some(content) = &page.contents else {
            pages.push((page_num + 1, String::new()));
            continue;
        };
        let operations = match content.operations(&resolver) {
            Ok(ops) => ops,
            Err(e) => {
                warn!("Skipping PDF page {}: {}", page_num + 1, e);
                failed += 1;
                continue;
            }
        };
        pages.push((page_num + 1, text_from_operations(&operations)));
    }

    if pages.is_empty() && failed > 0 {
        return Err(PdfLoadError::NoReadablePages);
    }
    Ok(pages)
}

fn push_newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

fn text_from_operations(operations: &[Op]) -> String {
    let mut text = String::new();
    for op in operations {
        match op {
            Op::TextDraw { text: drawn } => text.push_str(&drawn.to_string_lossy()),
            Op::TextDrawAdjusted { array } => {
                for item in array {
                    match item {
                        TextDrawAdjusted::Text(drawn) => text.push_str(&drawn.to_string_lossy()),
                        // Large negative kerning is how many writers encode a space.
                        TextDrawAdjusted::Spacing(offset) if *offset < -200.0 => text.push(' '),
                        TextDrawAdjusted::Spacing(_) => {}
                    }
                }
            }
            Op::TextNewline | Op::EndText => push_newline(&mut text),
            Op::MoveTextPosition { translation } if translation.y != 0.0 => {
                push_newline(&mut text)
            }
            _ => {}
        }
    }
    text
}

/// Extracts the text of a PDF with `--- Page N ---` markers, then repairs it.
#[instrument(skip(pdf_data), fields(bytes = pdf_data.len()))]
pub fn extract_text(pdf_data: &[u8]) -> Result<String, PdfLoadError> {
    let pages = extract_pages(pdf_data)?;
    let total = pages.len();
    let mut full_text = String::new();

    for (number, text) in pages {
        if text.trim().is_empty() {
            continue;
        }
        full_text.push_str(&format!("--- Page {number} ---\n"));
        full_text.push_str(text.trim_end());
        full_text.push_str("\n\n");
    }

    let repaired = repair_text(full_text.trim_end());
    info!(
        "Extracted {} characters from {} PDF pages.",
        repaired.chars().count(),
        total
    );
    Ok(repaired)
}

/// Refuses text whose remaining glyph codes would make it unreadable.
pub fn ensure_convertible(text: &str) -> Result<(), PdfLoadError> {
    let remaining = count_cid_codes(text);
    if remaining > MAX_REMAINING_CID_CODES {
        warn!("Refusing conversion: {} CID codes remain after repair.", remaining);
        return Err(PdfLoadError::TooManyCidCodes(remaining));
    }
    Ok(())
}

/// Converts a PDF to repaired plain text for download.
pub fn convert_pdf_to_text(pdf_data: &[u8]) -> Result<String, PdfLoadError> {
    let text = extract_text(pdf_data)?;
    ensure_convertible(&text)?;
    Ok(text)
}

// --- Loader Implementation ---

/// The `DocumentLoader` implementation for PDF documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for PdfLoader {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn load(&self, bytes: &[u8]) -> Result<String, LoadError> {
        Ok(extract_text(bytes)?)
    }
}
