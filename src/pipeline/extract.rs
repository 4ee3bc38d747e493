//! Text extraction: `.docx` bytes → plain text.
//!
//! A `.docx` file is a zip package whose body lives in `word/document.xml`.
//! Raw-text extraction walks that part and keeps only the text runs:
//!
//! * each paragraph (`w:p`) ends with a blank line
//! * `w:tab` becomes `\t`, `w:br` / `w:cr` become `\n`
//! * everything else (styles, drawings, field codes) is ignored
//!
//! Zip inflation and XML parsing are CPU-bound, so [`DocxExtractor`] runs
//! them on the blocking pool.

use crate::error::PipelineError;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::debug;

/// Path of the main document part inside the package.
const DOCUMENT_PART: &str = "word/document.xml";

/// Zip local-file-header signature.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Turns a document blob into its plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: Arc<[u8]>) -> Result<String, PipelineError>;
}

/// Extractor for WordprocessingML (`.docx`) packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

#[async_trait]
impl TextExtractor for DocxExtractor {
    async fn extract(&self, bytes: Arc<[u8]>) -> Result<String, PipelineError> {
        tokio::task::spawn_blocking(move || extract_docx_text(&bytes))
            .await
            .map_err(|e| PipelineError::ExtractionFailed {
                detail: format!("extraction task failed: {e}"),
            })?
    }
}

/// Extract the raw text of a `.docx` package held in memory.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, PipelineError> {
    if bytes.len() < ZIP_MAGIC.len() || &bytes[..ZIP_MAGIC.len()] != ZIP_MAGIC {
        return Err(PipelineError::NotADocument {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| PipelineError::ExtractionFailed {
            detail: format!("corrupt package: {e}"),
        })?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| PipelineError::ExtractionFailed {
            detail: format!("{DOCUMENT_PART}: {e}"),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| PipelineError::ExtractionFailed {
            detail: format!("{DOCUMENT_PART}: {e}"),
        })?;

    let text = document_xml_to_text(&xml)?;
    debug!("Extracted {} chars from {} byte package", text.chars().count(), bytes.len());
    Ok(text)
}

/// Collect the text runs of a `word/document.xml` body.
pub fn document_xml_to_text(xml: &str) -> Result<String, PipelineError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len() / 4);
    let mut in_text = false;
    // Inside paragraph properties, `w:tab` is a tab-stop definition.
    let mut in_props = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"pPr" => in_props = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if !in_props => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| PipelineError::ExtractionFailed {
                    detail: format!("bad text run: {e}"),
                })?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"pPr" => in_props = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(PipelineError::ExtractionFailed {
                    detail: format!(
                        "malformed {DOCUMENT_PART} at byte {}: {e}",
                        reader.buffer_position()
                    ),
                })
            }
        }
    }

    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn package(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>张三</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">北京大学 </w:t></w:r><w:r><w:t>教授</w:t></w:r></w:p>
    <w:p><w:r><w:t>课程</w:t><w:tab/><w:t>A&amp;B</w:t><w:br/><w:t>第二行</w:t></w:r></w:p>
    <w:p/>
    <w:sectPr><w:pgSz w:w="11906"/></w:sectPr>
  </w:body>
</w:document>"#;

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let text = document_xml_to_text(BODY).unwrap();
        assert_eq!(text, "张三\n\n北京大学 教授\n\n课程\tA&B\n第二行");
    }

    #[test]
    fn whitespace_between_elements_is_not_text() {
        let text = document_xml_to_text(BODY).unwrap();
        assert!(!text.contains("    "));
    }

    #[test]
    fn extracts_from_zip_package() {
        let text = extract_docx_text(&package(BODY)).unwrap();
        assert!(text.starts_with("张三"));
    }

    #[test]
    fn non_zip_bytes_are_not_a_document() {
        let err = extract_docx_text(b"%PDF-1.7 ...").unwrap_err();
        assert_eq!(
            err,
            PipelineError::NotADocument {
                magic: b"%PDF".to_vec()
            }
        );
    }

    #[test]
    fn package_without_body_fails() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_docx_text(&bytes).unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailed { .. }));
    }

    #[test]
    fn truncated_zip_fails() {
        let mut bytes = package(BODY);
        bytes.truncate(bytes.len() / 2);
        assert!(extract_docx_text(&bytes).is_err());
    }

    #[tokio::test]
    async fn extractor_runs_on_blocking_pool() {
        let bytes: Arc<[u8]> = package(BODY).into();
        let text = DocxExtractor.extract(bytes).await.unwrap();
        assert!(text.contains("教授"));
    }
}
