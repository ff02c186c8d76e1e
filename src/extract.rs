//! File-to-text extraction for the formats handbooks arrive in: plain
//! text/markdown, PDF, and docx. Extraction failures are per-document
//! errors; the ingestion loop records them and moves on.

use std::io::Read;
use std::path::Path;

use crate::error::RagError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract plain text from a file, routed by extension.
pub fn extract_file(path: &Path) -> Result<String, RagError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => std::fs::read_to_string(path).map_err(|e| {
            RagError::Extraction(format!("failed to read {}: {e}", path.display()))
        }),
        "pdf" => {
            let bytes = std::fs::read(path).map_err(|e| {
                RagError::Extraction(format!("failed to read {}: {e}", path.display()))
            })?;
            extract_pdf(&bytes)
        }
        "docx" => {
            let bytes = std::fs::read(path).map_err(|e| {
                RagError::Extraction(format!("failed to read {}: {e}", path.display()))
            })?;
            extract_docx(&bytes)
        }
        other => Err(RagError::Extraction(format!(
            "unsupported file extension: '{other}' ({})",
            path.display()
        ))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, RagError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF extraction failed: {e}")))
}

/// Pull the `w:t` runs out of `word/document.xml`, one line per `w:p`
/// paragraph so the chunkers see paragraph boundaries.
fn extract_docx(bytes: &[u8]) -> Result<String, RagError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extraction(format!("docx open failed: {e}")))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| RagError::Extraction("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| RagError::Extraction(format!("docx read failed: {e}")))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(RagError::Extraction(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    extract_paragraph_text(&doc_xml)
}

fn extract_paragraph_text(xml: &[u8]) -> Result<String, RagError> {
    let mut out = String::new();
    // No trim_text here: whitespace inside w:t runs is significant.
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = false;
                } else if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(RagError::Extraction(format!("docx parse failed: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_plain_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handbook.txt");
        std::fs::write(&path, "Attendance policy.\n\nSection two.").unwrap();
        let text = extract_file(&path).unwrap();
        assert_eq!(text, "Attendance policy.\n\nSection two.");
    }

    #[test]
    fn unsupported_extension_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handbook.pptx");
        std::fs::write(&path, b"whatever").unwrap();
        assert!(matches!(
            extract_file(&path),
            Err(RagError::Extraction(_))
        ));
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        assert!(matches!(
            extract_file(Path::new("/nonexistent/handbook.txt")),
            Err(RagError::Extraction(_))
        ));
    }

    #[test]
    fn invalid_pdf_is_an_extraction_error() {
        assert!(matches!(
            extract_pdf(b"not a pdf"),
            Err(RagError::Extraction(_))
        ));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = br#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second </w:t></w:r><w:r><w:t>paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file(
                    "word/document.xml",
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
            writer.write_all(xml).unwrap();
            writer.finish().unwrap();
        }

        let text = extract_docx(cursor.get_ref()).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.\n");
    }

    #[test]
    fn invalid_zip_is_an_extraction_error() {
        assert!(matches!(
            extract_docx(b"not a zip"),
            Err(RagError::Extraction(_))
        ));
    }
}
