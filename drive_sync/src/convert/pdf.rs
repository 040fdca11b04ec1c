//! PDF to text.

use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::info;

use super::{display_name, inputs, write_sibling};
use crate::error::Result;

/// Extract the text of a PDF file, pages concatenated in order.
pub fn pdf_to_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let doc = Document::load(path.as_ref())?;
    document_text(&doc)
}

/// Concatenate per-page text with no separator between pages.
pub fn document_text(doc: &Document) -> Result<String> {
    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        text.push_str(&doc.extract_text(&[*page_number])?);
    }
    Ok(text)
}

/// Convert one PDF, or every `*.pdf` (any case) in a directory, to `.txt`.
pub fn convert_pdfs<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::new();
    for input in inputs(path.as_ref(), is_pdf)? {
        let text = pdf_to_text(&input)?;
        let output = write_sibling(&input, &text)?;
        info!(
            "Processed and saved: {} as {}",
            display_name(&input),
            display_name(&output)
        );
        outputs.push(output);
    }
    Ok(outputs)
}

fn is_pdf(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}
