//! Excel workbooks (`.xlsx` and legacy `.xls`) read through calamine.
//!
//! The workbook is first loaded into a [`Workbook`] of typed cells. Extraction
//! renders it as text; the converter reuses the same model for CSV and JSON.

use std::fmt;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;

use crate::error::ExtractError;
use crate::extract::{ExtractMetadata, Extracted, Extractor};
use crate::format::DocumentFormat;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Rows as display strings, the form used for text and CSV output.
    pub fn string_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }
}

fn spreadsheet_error(reason: String) -> ExtractError {
    ExtractError::extraction(DocumentFormat::Spreadsheet, reason)
}

/// Loads every sheet of a workbook, in workbook order.
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| spreadsheet_error(format!("Failed to open workbook: {}", e)))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| spreadsheet_error(format!("Failed to read sheet '{}': {}", name, e)))?;

        let rows = range
            .rows()
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();

        sheets.push(Sheet { name, rows });
    }

    Ok(Workbook { sheets })
}

/// Renders a workbook as text: a `=== Sheet: <name> ===` banner per sheet,
/// tab-separated cells, one line per row, a blank line between sheets.
pub fn render_workbook_text(workbook: &Workbook) -> String {
    workbook
        .sheets
        .iter()
        .map(|sheet| {
            let mut block = format!("=== Sheet: {} ===\n", sheet.name);
            for row in sheet.string_rows() {
                block.push_str(&row.join("\t"));
                block.push('\n');
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct SpreadsheetExtractor;

impl SpreadsheetExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for SpreadsheetExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, ExtractError> {
        let _span = tracing::info_span!("extract.spreadsheet").entered();

        let workbook = read_workbook(bytes)?;
        let metadata = ExtractMetadata {
            sheet_names: workbook.sheet_names(),
            sheet_count: Some(workbook.sheets.len()),
            ..Default::default()
        };

        Ok(Extracted {
            text: render_workbook_text(&workbook),
            metadata,
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Spreadsheet)
    }
}
