use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractError;
use crate::extract::{ExtractMetadata, Extracted, Extractor};
use crate::format::DocumentFormat;

pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, ExtractError> {
        let _span = tracing::info_span!("extract.docx").entered();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| docx_error(format!("Failed to open DOCX: {}", e)))?;

        let xml = read_document_xml(&mut archive)?;
        let parsed = parse_docx_xml(&xml)?;

        let mut metadata = ExtractMetadata::default();
        if parsed.skipped_objects > 0 {
            metadata.warnings.push(format!(
                "{} embedded object(s) without text were skipped",
                parsed.skipped_objects
            ));
        }
        if parsed.text.trim().is_empty() {
            metadata
                .warnings
                .push("Document body contains no text".to_string());
        }

        Ok(Extracted {
            text: parsed.text,
            metadata,
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Docx)
    }
}

fn docx_error(reason: String) -> ExtractError {
    ExtractError::extraction(DocumentFormat::Docx, reason)
}

fn read_document_xml<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ExtractError> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| docx_error(format!("Failed to find document.xml: {}", e)))?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| docx_error(format!("Failed to read document.xml: {}", e)))?;

    Ok(xml)
}

struct ParsedBody {
    text: String,
    skipped_objects: usize,
}

/// Collects the text runs of `word/document.xml`, one line per paragraph.
fn parse_docx_xml(xml: &str) -> Result<ParsedBody, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text_element = false;
    let mut skipped_objects = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = true,
                b"drawing" | b"object" | b"pict" => skipped_objects += 1,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" | b"p" => text.push('\n'),
                b"drawing" | b"object" | b"pict" => skipped_objects += 1,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let decoded = e.decode().unwrap_or_default();
                    text.push_str(&decoded);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text_element {
                    let name = e.decode().unwrap_or_default();
                    if let Some(c) = resolve_entity(&name) {
                        text.push(c);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(docx_error(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    Ok(ParsedBody {
        text,
        skipped_objects,
    })
}

/// Resolves the predefined XML entities and numeric character references.
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}
