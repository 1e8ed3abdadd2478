//! CSV and JSON renderings of a single sheet.

use crate::error::ConvertError;
use crate::extract::spreadsheet::Sheet;
use crate::format::TargetFormat;

fn render_error(target: TargetFormat, reason: impl ToString) -> ConvertError {
    ConvertError::Render {
        target,
        reason: reason.to_string(),
    }
}

/// Writes the sheet's rows as CSV. Rows may differ in width; fields are quoted
/// only when they contain a delimiter, quote or line break.
pub fn sheet_to_csv(sheet: Option<&Sheet>) -> Result<Vec<u8>, ConvertError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    if let Some(sheet) = sheet {
        for row in sheet.string_rows() {
            writer
                .write_record(&row)
                .map_err(|e| render_error(TargetFormat::Csv, e))?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| render_error(TargetFormat::Csv, e))
}

/// Serializes the sheet as a pretty-printed array of row arrays with typed cells.
/// A workbook without sheets yields `[]`.
pub fn sheet_to_json(sheet: Option<&Sheet>) -> Result<Vec<u8>, ConvertError> {
    let rows = sheet.map(|s| s.rows.as_slice()).unwrap_or_default();
    serde_json::to_vec_pretty(rows).map_err(|e| render_error(TargetFormat::Json, e))
}
