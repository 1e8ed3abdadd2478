use lopdf::{Document, Object};

use crate::error::ExtractError;
use crate::extract::{ExtractMetadata, Extracted, Extractor};
use crate::format::DocumentFormat;

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, ExtractError> {
        let _span = tracing::info_span!("extract.pdf").entered();

        let doc = Document::load_mem(bytes).map_err(|e| {
            ExtractError::extraction(DocumentFormat::Pdf, format!("Failed to load PDF: {}", e))
        })?;

        let pages = doc.get_pages();
        let mut text = String::new();
        let mut warnings = Vec::new();

        for (page_num, _) in pages.iter() {
            match doc.extract_text(&[*page_num]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable PDF page {}: {}", page_num, e);
                    warnings.push(format!("Page {} could not be read: {}", page_num, e));
                }
            }
        }

        let mut metadata = ExtractMetadata {
            page_count: Some(pages.len()),
            warnings,
            ..Default::default()
        };
        read_info(&doc, &mut metadata);

        Ok(Extracted { text, metadata })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

/// Copies Title, Author and Producer out of the trailer's Info dictionary.
/// A missing or malformed Info dictionary leaves the fields unset.
fn read_info(doc: &Document, metadata: &mut ExtractMetadata) {
    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(info) = info else {
        return;
    };

    let field = |key: &[u8]| -> Option<String> {
        let raw = info.get(key).ok()?.as_str().ok()?;
        let value = decode_pdf_string(raw);
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    };

    metadata.title = field(b"Title");
    metadata.author = field(b"Author");
    metadata.producer = field(b"Producer");
}

/// Decodes a PDF text string: UTF-16BE when it carries a byte order mark,
/// otherwise one byte per character.
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(body) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    raw.iter().map(|&b| b as char).collect()
}
