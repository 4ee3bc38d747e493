//! Export: `StructuredProfile` → formatted `.docx` document.
//!
//! Layout of the generated document:
//!
//! ```text
//!                 <name>简介                  (Heading 1, centered)
//! 职称头衔 ───────────────────────────────    (Heading 2, bottom border)
//! • first title ....................  ┌────┐
//! • second title ...................  │img │ (anchored to the first
//!                                     └────┘  titles paragraph, right)
//! 从业经历 ───────────────────────────────
//! • ...
//! ```
//!
//! Sections follow the canonical category order and empty categories are
//! skipped entirely. A portrait keeps the titles heading even when `titles`
//! is empty, so the image has a paragraph to anchor to.
//!
//! The package is written directly as WordprocessingML parts into a zip
//! container: content types, relationships, styles, bullet numbering, the
//! document body and the portrait media part.

use crate::error::BioCraftError;
use crate::pipeline::encode::{from_data_url, DecodedImage};
use crate::profile::{FieldValue, StructuredProfile};
use crate::schema::Category;
use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::CompressionMethod;

/// Serializes a profile into a downloadable document.
pub trait ProfileExporter: Send + Sync {
    /// File extension of the produced document, without the dot.
    fn extension(&self) -> &'static str;

    fn export(&self, profile: &StructuredProfile) -> Result<Vec<u8>, BioCraftError>;
}

/// Exporter producing WordprocessingML (`.docx`) packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExporter;

impl ProfileExporter for DocxExporter {
    fn extension(&self) -> &'static str {
        "docx"
    }

    fn export(&self, profile: &StructuredProfile) -> Result<Vec<u8>, BioCraftError> {
        let portrait = profile
            .profile_image
            .as_deref()
            .map(from_data_url)
            .transpose()
            .map_err(|e| export_error(profile, e))?;

        let document = document_xml(profile, portrait.as_ref());
        let bytes = write_package(&document, portrait.as_ref())
            .map_err(|e| export_error(profile, e))?;
        debug!("Exported '{}' as {} byte package", profile.name, bytes.len());
        Ok(bytes)
    }
}

/// File name of an exported profile: `<name>_简介.<ext>`.
///
/// Characters that are not allowed in file names are replaced by `_`.
pub fn export_file_name(profile: &StructuredProfile, extension: &str) -> String {
    let name: String = profile
        .name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{name}_简介.{extension}")
}

fn export_error(profile: &StructuredProfile, e: impl std::fmt::Display) -> BioCraftError {
    BioCraftError::ExportFailed {
        name: profile.name.clone(),
        detail: e.to_string(),
    }
}

// ── Package parts ────────────────────────────────────────────────────────

const PORTRAIT_REL_ID: &str = "rIdPortrait";

/// Portrait box in pixels, converted to EMU (9525 per pixel at 96 DPI).
const PORTRAIT_WIDTH_EMU: u64 = 150 * 9525;
const PORTRAIT_HEIGHT_EMU: u64 = 200 * 9525;

/// Gap between the portrait and wrapping text, in EMU.
const PORTRAIT_DIST_LEFT: u64 = 127_000;
const PORTRAIT_DIST_BOTTOM: u64 = 63_500;

/// Body text size in half-points (12pt).
const BODY_SIZE: u32 = 24;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="jpeg" ContentType="image/jpeg"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Inter" w:hAnsi="Inter" w:eastAsia="Microsoft YaHei" w:cs="Inter"/><w:sz w:val="24"/><w:szCs w:val="24"/><w:lang w:val="en-US" w:eastAsia="zh-CN"/></w:rPr></w:rPrDefault><w:pPrDefault/></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/><w:rPr><w:rFonts w:ascii="Inter" w:hAnsi="Inter"/><w:color w:val="334155"/><w:sz w:val="24"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:after="240"/><w:jc w:val="center"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:rFonts w:ascii="Merriweather" w:hAnsi="Merriweather"/><w:b/><w:color w:val="1E293B"/><w:sz w:val="48"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:rFonts w:ascii="Merriweather" w:hAnsi="Merriweather"/><w:b/><w:color w:val="334155"/><w:sz w:val="32"/></w:rPr></w:style></w:styles>"#;

const NUMBERING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="singleLevel"/><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#;

fn document_rels_xml(portrait: Option<&DecodedImage>) -> String {
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>"#,
    );
    if let Some(image) = portrait {
        rels.push_str(&format!(
            r#"<Relationship Id="{PORTRAIT_REL_ID}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/portrait.{}"/>"#,
            image.format.extension()
        ));
    }
    rels.push_str("</Relationships>");
    rels
}

fn write_package(
    document: &str,
    portrait: Option<&DecodedImage>,
) -> Result<Vec<u8>, zip::result::ZipError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS_XML.as_bytes()),
        ("word/document.xml", document.as_bytes()),
        ("word/styles.xml", STYLES_XML.as_bytes()),
        ("word/numbering.xml", NUMBERING_XML.as_bytes()),
    ];
    for (name, data) in parts {
        zip.start_file(name, options)?;
        zip.write_all(data)?;
    }

    zip.start_file("word/_rels/document.xml.rels", options)?;
    zip.write_all(document_rels_xml(portrait).as_bytes())?;

    if let Some(image) = portrait {
        // Already-compressed image data.
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(format!("word/media/portrait.{}", image.format.extension()), stored)?;
        zip.write_all(&image.bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

// ── Document body ────────────────────────────────────────────────────────

const DOCUMENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><w:body>"#;

/// A4 page, 1 inch margins.
const DOCUMENT_CLOSE: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

fn document_xml(profile: &StructuredProfile, portrait: Option<&DecodedImage>) -> String {
    let mut body = String::with_capacity(4096);
    body.push_str(DOCUMENT_OPEN);
    body.push_str(&title_paragraph(&format!("{}简介", profile.name.trim())));

    for category in Category::all() {
        let value = profile.field(category);
        let image = match category {
            Category::Titles => portrait,
            _ => None,
        };
        if value.is_empty() && image.is_none() {
            continue;
        }
        body.push_str(&section_heading(category.label()));
        push_section_content(&mut body, value, image);
    }

    body.push_str(DOCUMENT_CLOSE);
    body
}

fn push_section_content(body: &mut String, value: FieldValue<'_>, image: Option<&DecodedImage>) {
    let mut anchor = image.map(anchored_image_run);
    match value {
        FieldValue::List(items) if !items.is_empty() => {
            for item in items {
                // The portrait floats beside the first item.
                let leading = anchor.take().unwrap_or_default();
                body.push_str(&bullet_paragraph(&leading, item));
            }
        }
        FieldValue::Text(text) if !text.is_empty() => {
            let leading = anchor.take().unwrap_or_default();
            body.push_str(&text_paragraph(&leading, text));
        }
        _ => {
            if let Some(run) = anchor.take() {
                body.push_str(&format!(
                    r#"<w:p><w:pPr><w:spacing w:after="100"/></w:pPr>{run}</w:p>"#
                ));
            }
        }
    }
}

fn title_paragraph(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:spacing w:after="600"/><w:jc w:val="center"/></w:pPr>{}</w:p>"#,
        plain_run(text)
    )
}

fn section_heading(label: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="4" w:color="94A3B8"/></w:pBdr><w:spacing w:before="400" w:after="200"/></w:pPr>{}</w:p>"#,
        plain_run(label)
    )
}

fn bullet_paragraph(leading: &str, item: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr><w:spacing w:after="100"/></w:pPr>{leading}{}</w:p>"#,
        body_run(item)
    )
}

fn text_paragraph(leading: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:spacing w:after="100"/></w:pPr>{leading}{}</w:p>"#,
        body_run(text)
    )
}

fn plain_run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, escape(text))
}

/// A 12pt run; line breaks inside the text become `w:br`.
fn body_run(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| format!(r#"<w:t xml:space="preserve">{}</w:t>"#, escape(line)))
        .collect();
    format!(
        r#"<w:r><w:rPr><w:sz w:val="{BODY_SIZE}"/><w:szCs w:val="{BODY_SIZE}"/></w:rPr>{}</w:r>"#,
        lines.join("<w:br/>")
    )
}

/// Floating portrait: right of the column, top of the anchoring paragraph,
/// square wrapping with text on the left.
fn anchored_image_run(image: &DecodedImage) -> String {
    let (cx, cy) = (PORTRAIT_WIDTH_EMU, PORTRAIT_HEIGHT_EMU);
    let ext = image.format.extension();
    format!(
        concat!(
            r#"<w:r><w:drawing>"#,
            r#"<wp:anchor distT="0" distB="{db}" distL="{dl}" distR="0" simplePos="0" relativeHeight="251659264" behindDoc="0" locked="0" layoutInCell="1" allowOverlap="1">"#,
            r#"<wp:simplePos x="0" y="0"/>"#,
            r#"<wp:positionH relativeFrom="column"><wp:align>right</wp:align></wp:positionH>"#,
            r#"<wp:positionV relativeFrom="paragraph"><wp:align>top</wp:align></wp:positionV>"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:wrapSquare wrapText="left"/>"#,
            r#"<wp:docPr id="1" name="Portrait"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="portrait.{ext}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:anchor></w:drawing></w:r>"#,
        ),
        db = PORTRAIT_DIST_BOTTOM,
        dl = PORTRAIT_DIST_LEFT,
        cx = cx,
        cy = cy,
        ext = ext,
        rel = PORTRAIT_REL_ID,
    )
}
