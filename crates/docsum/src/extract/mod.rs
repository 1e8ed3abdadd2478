pub mod docx;
pub mod pdf;
pub mod spreadsheet;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::format::{normalize_extension, DocumentFormat};

/// Format-specific details gathered during extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sheet_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_count: Option<usize>,
    /// Non-fatal problems, e.g. content the extractor skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub struct Extracted {
    pub text: String,
    pub metadata: ExtractMetadata,
}

impl Extracted {
    pub fn text_only(text: String) -> Self {
        Self {
            text,
            metadata: ExtractMetadata::default(),
        }
    }
}

/// Turns the raw bytes of one document format into plain text.
///
/// Implementations hold no mutable state, so one registry can serve any number
/// of concurrent extractions.
pub trait Extractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, ExtractError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        let extractors: Vec<Box<dyn Extractor>> = vec![
            Box::new(text::TextExtractor::new()),
            Box::new(pdf::PdfExtractor::new()),
            Box::new(docx::DocxExtractor::new()),
            Box::new(spreadsheet::SpreadsheetExtractor::new()),
        ];

        Self { extractors }
    }

    /// Extracts text from `bytes`, choosing the extractor by `extension`
    /// (case-insensitive, leading dot optional).
    pub fn extract(&self, bytes: &[u8], extension: &str) -> Result<Extracted, ExtractError> {
        let extension = normalize_extension(extension);
        let format = DocumentFormat::from_extension(&extension)
            .ok_or_else(|| ExtractError::UnsupportedFormat(extension.clone()))?;

        let _span = tracing::info_span!("extract", format = %format, bytes = bytes.len()).entered();

        for extractor in &self.extractors {
            if extractor.supports(format) {
                return extractor.extract(bytes);
            }
        }

        Err(ExtractError::UnsupportedFormat(extension))
    }

    pub fn supports_extension(&self, extension: &str) -> bool {
        DocumentFormat::from_extension(extension)
            .map(|format| self.extractors.iter().any(|e| e.supports(format)))
            .unwrap_or(false)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
