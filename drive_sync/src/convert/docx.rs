//! DOCX to text.
//!
//! Reads `word/document.xml` straight out of the zip container. Only
//! paragraphs that are direct children of `w:body` count, so table cells and
//! text boxes are left out.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::info;
use zip::ZipArchive;

use super::{display_name, inputs, write_sibling};
use crate::error::Result;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract paragraph text from a DOCX file, one paragraph per line.
pub fn docx_to_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let file = File::open(path.as_ref())?;
    let mut archive = ZipArchive::new(file)?;

    let mut xml = String::new();
    archive.by_name(DOCUMENT_PART)?.read_to_string(&mut xml)?;

    Ok(body_paragraphs(&xml)?.join("\n"))
}

/// Text of each body-level paragraph of a WordprocessingML document.
pub fn body_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut para_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"w:p" => {
                        if para_depth == 0 && parent_is(&stack, b"w:body") {
                            current = Some(String::new());
                        }
                        para_depth += 1;
                    }
                    b"w:t" => in_text = true,
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let in_run = para_depth == 1 && parent_is(&stack, b"w:r");
                match e.name().as_ref() {
                    b"w:p" if para_depth == 0 && parent_is(&stack, b"w:body") => {
                        paragraphs.push(String::new());
                    }
                    b"w:tab" if in_run => push_text(&mut current, "\t"),
                    b"w:br" | b"w:cr" if in_run => push_text(&mut current, "\n"),
                    _ => {}
                }
            }
            Event::Text(t) if in_text && para_depth == 1 => {
                let text = t.unescape().map_err(quick_xml::Error::from)?;
                push_text(&mut current, &text);
            }
            Event::End(e) => {
                stack.pop();
                match e.name().as_ref() {
                    b"w:p" => {
                        para_depth = para_depth.saturating_sub(1);
                        if para_depth == 0 {
                            if let Some(paragraph) = current.take() {
                                paragraphs.push(paragraph);
                            }
                        }
                    }
                    b"w:t" => in_text = false,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn parent_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|last| last.as_slice() == name)
}

fn push_text(current: &mut Option<String>, text: &str) {
    if let Some(paragraph) = current.as_mut() {
        paragraph.push_str(text);
    }
}

/// Convert one DOCX, or every `*.docx` in a directory, to `.txt`.
pub fn convert_docx<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::new();
    for input in inputs(path.as_ref(), |name| name.ends_with(".docx"))? {
        let text = docx_to_text(&input)?;
        let output = write_sibling(&input, &text)?;
        info!(
            "Converted {} to {}",
            display_name(&input),
            display_name(&output)
        );
        outputs.push(output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {}><w:body>{}</w:body></w:document>"#,
            NS, body
        )
    }

    #[test]
    fn test_two_paragraphs() {
        let xml = document(
            "<w:p><w:r><w:t>p1</w:t></w:r></w:p><w:p><w:r><w:t>p2</w:t></w:r></w:p>",
        );
        assert_eq!(body_paragraphs(&xml).unwrap().join("\n"), "p1\np2");
    }

    #[test]
    fn test_runs_tabs_breaks_and_entities() {
        let xml = document(concat!(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>"#,
            r#"<w:r><w:t xml:space="preserve">Fish </w:t></w:r>"#,
            "<w:r><w:t>&amp; chips</w:t><w:tab/><w:t>x</w:t><w:br/><w:t>y</w:t></w:r></w:p>",
        ));
        assert_eq!(body_paragraphs(&xml).unwrap(), vec!["Fish & chips\tx\ny"]);
    }

    #[test]
    fn test_empty_paragraphs_kept_tables_skipped() {
        let xml = document(concat!(
            "<w:p><w:r><w:t>before</w:t></w:r></w:p>",
            "<w:p/>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p></w:p>",
            "<w:p><w:r><w:t>after</w:t></w:r></w:p>",
        ));
        assert_eq!(
            body_paragraphs(&xml).unwrap(),
            vec!["before", "", "", "after"]
        );
    }

    #[test]
    fn test_textbox_paragraphs_not_merged() {
        let xml = document(concat!(
            "<w:p><w:r><w:t>outer</w:t>",
            "<w:txbxContent><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:txbxContent>",
            "</w:r></w:p>",
        ));
        assert_eq!(body_paragraphs(&xml).unwrap(), vec!["outer"]);
    }
}
