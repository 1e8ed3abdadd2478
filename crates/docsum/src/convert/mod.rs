//! Re-renders a stored upload in one of the export formats.

mod tabular;

use serde_json::json;

use crate::error::ConvertError;
use crate::extract::spreadsheet::{read_workbook, render_workbook_text};
use crate::extract::ExtractorRegistry;
use crate::format::{normalize_extension, DocumentFormat, TargetFormat};

pub use tabular::{sheet_to_csv, sheet_to_json};

/// Stateless converter; one instance can be shared across threads.
pub struct Converter {
    extractors: ExtractorRegistry,
}

impl Converter {
    pub fn new() -> Self {
        Self {
            extractors: ExtractorRegistry::new(),
        }
    }

    /// Converts the raw bytes of an upload, identified by its extension, into `target`.
    ///
    /// Spreadsheets convert their first sheet to CSV or JSON and all sheets to text.
    /// Text sources are returned unchanged for `Txt`. CSV is only offered for
    /// spreadsheets.
    pub fn convert(
        &self,
        bytes: &[u8],
        source_extension: &str,
        target: TargetFormat,
    ) -> Result<Vec<u8>, ConvertError> {
        let extension = normalize_extension(source_extension);
        let format = DocumentFormat::from_extension(&extension)
            .ok_or_else(|| ConvertError::UnsupportedFormat(extension.clone()))?;

        let _span =
            tracing::info_span!("convert", from = %format, to = %target, bytes = bytes.len())
                .entered();

        match (format, target) {
            (DocumentFormat::Spreadsheet, _) => {
                let workbook = read_workbook(bytes)?;
                match target {
                    TargetFormat::Txt => Ok(render_workbook_text(&workbook).into_bytes()),
                    TargetFormat::Csv => sheet_to_csv(workbook.first_sheet()),
                    TargetFormat::Json => sheet_to_json(workbook.first_sheet()),
                }
            }
            (_, TargetFormat::Csv) => Err(ConvertError::UnsupportedConversion {
                from: format,
                to: target,
            }),
            (DocumentFormat::Text, TargetFormat::Txt) => Ok(bytes.to_vec()),
            (DocumentFormat::Text, TargetFormat::Json) => {
                let extracted = self.extractors.extract(bytes, &extension)?;
                to_pretty_json(&json!({ "content": extracted.text }))
            }
            (_, TargetFormat::Txt) => {
                let extracted = self.extractors.extract(bytes, &extension)?;
                Ok(extracted.text.into_bytes())
            }
            (_, TargetFormat::Json) => {
                let extracted = self.extractors.extract(bytes, &extension)?;
                to_pretty_json(&json!({
                    "text": extracted.text,
                    "metadata": extracted.metadata,
                }))
            }
        }
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_pretty_json(value: &serde_json::Value) -> Result<Vec<u8>, ConvertError> {
    serde_json::to_vec_pretty(value).map_err(|e| ConvertError::Render {
        target: TargetFormat::Json,
        reason: e.to_string(),
    })
}
