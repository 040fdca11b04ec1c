//! Plain-text extraction from local documents.
//!
//! Each converter accepts either a single file or a directory. A directory is
//! scanned (non-recursively) for matching documents; every output lands next
//! to its input with the extension replaced by `.txt`.

pub mod docx;
pub mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use docx::{convert_docx, docx_to_text};
pub use pdf::{convert_pdfs, pdf_to_text};

/// Inputs to convert: `path` itself if it is a file, otherwise the regular
/// files in it whose name satisfies `wanted`, sorted.
fn inputs(path: &Path, wanted: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let candidate = entry.path();
        let matches = candidate
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(&wanted);
        if matches && candidate.is_file() {
            found.push(candidate);
        }
    }

    found.sort();
    Ok(found)
}

/// Write `text` to the `.txt` sibling of `input` and return its path.
fn write_sibling(input: &Path, text: &str) -> Result<PathBuf> {
    let output = input.with_extension("txt");
    fs::write(&output, text)?;
    Ok(output)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
