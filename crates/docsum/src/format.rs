//! Source document formats and export targets, keyed by file extension.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Extensions accepted at ingestion, lowercase and without the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx", "xlsx", "xls"];

/// Lowercases an extension and strips a leading dot (`".PDF"` → `"pdf"`).
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Returns the normalized extension of a file name or path, or `""` if it has none.
pub fn extension_of<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Plain text and Markdown.
    Text,
    Pdf,
    Docx,
    /// Excel workbooks, both `.xlsx` and legacy `.xls`.
    Spreadsheet,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match normalize_extension(ext).as_str() {
            "txt" | "md" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export formats offered by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Txt,
    Csv,
    Json,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Txt => "text/plain; charset=utf-8",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = crate::error::ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_extension(s).as_str() {
            "txt" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(crate::error::ConvertError::UnknownTarget(s.to_string())),
        }
    }
}
