use crate::error::ExtractError;
use crate::extract::{Extracted, Extractor};
use crate::format::DocumentFormat;

/// Plain text and Markdown, decoded as UTF-8 verbatim.
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for TextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, ExtractError> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ExtractError::extraction(DocumentFormat::Text, format!("Invalid UTF-8: {}", e))
        })?;

        Ok(Extracted::text_only(text.to_string()))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
