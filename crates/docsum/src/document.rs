//! The per-upload document record and the partial updates applied to it.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::extract::{ExtractMetadata, Extracted};
use crate::summary::SummaryStatus;

/// Diagnostic stored when a document yields no text at all.
pub const NO_CONTENT_DIAGNOSTIC: &str = "No text content could be extracted from the document";

/// Opaque document identifier. Generated as a UUID v4 at ingestion and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable provenance of an upload, captured before extraction.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub id: DocumentId,
    pub original_name: String,
    pub stored_path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub original_name: String,
    pub stored_path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Extracted plain text. Empty when extraction failed or produced nothing.
    pub content: String,
    #[serde(default)]
    pub metadata: ExtractMetadata,
    pub summary: Option<String>,
    pub summary_status: SummaryStatus,
    pub summary_date: Option<DateTime<Utc>>,
    pub upload_date: DateTime<Utc>,
}

impl DocumentRecord {
    /// Builds the record for a successful extraction.
    ///
    /// Whitespace-only text counts as no content: the record starts `Failed`
    /// so it is never handed to the summarizer.
    pub fn ingested(provenance: Provenance, extracted: Extracted, now: DateTime<Utc>) -> Self {
        let Extracted { text, metadata } = extracted;
        if text.trim().is_empty() {
            return Self::failed_at_ingestion(provenance, metadata, NO_CONTENT_DIAGNOSTIC, now);
        }

        Self {
            id: provenance.id,
            original_name: provenance.original_name,
            stored_path: provenance.stored_path,
            size_bytes: provenance.size_bytes,
            mime_type: provenance.mime_type,
            content: text,
            metadata,
            summary: None,
            summary_status: SummaryStatus::Pending,
            summary_date: None,
            upload_date: now,
        }
    }

    /// Builds the degraded record kept when extraction fails.
    pub fn extraction_failed(
        provenance: Provenance,
        error: &ExtractError,
        now: DateTime<Utc>,
    ) -> Self {
        let diagnostic = format!("Content extraction failed: {}", error);
        Self::failed_at_ingestion(provenance, ExtractMetadata::default(), &diagnostic, now)
    }

    fn failed_at_ingestion(
        provenance: Provenance,
        metadata: ExtractMetadata,
        diagnostic: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: provenance.id,
            original_name: provenance.original_name,
            stored_path: provenance.stored_path,
            size_bytes: provenance.size_bytes,
            mime_type: provenance.mime_type,
            content: String::new(),
            metadata,
            summary: Some(diagnostic.to_string()),
            summary_status: SummaryStatus::Failed,
            summary_date: Some(now),
            upload_date: now,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Checks the record-level invariants tying status, summary and content together.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        match self.summary_status {
            SummaryStatus::Completed if self.summary.as_deref().unwrap_or("").is_empty() => {
                Some("completed without a summary")
            }
            SummaryStatus::Completed | SummaryStatus::Failed if self.summary_date.is_none() => {
                Some("terminal status without a summary date")
            }
            SummaryStatus::Processing | SummaryStatus::Completed if self.content.is_empty() => {
                Some("summarizing a document without content")
            }
            _ => None,
        }
    }
}

/// A set of field writes committed atomically by [`crate::store::MetadataStore`].
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub content: Option<String>,
    pub metadata: Option<ExtractMetadata>,
    pub summary: Option<Option<String>>,
    pub summary_status: Option<SummaryStatus>,
    pub summary_date: Option<Option<DateTime<Utc>>>,
}

impl DocumentPatch {
    /// Claims a document for summarization.
    pub fn processing() -> Self {
        Self {
            summary_status: Some(SummaryStatus::Processing),
            ..Self::default()
        }
    }

    /// Re-trigger reset. The previous summary is cleared with it.
    pub fn pending() -> Self {
        Self {
            summary: Some(None),
            summary_status: Some(SummaryStatus::Pending),
            summary_date: Some(None),
            ..Self::default()
        }
    }

    pub fn completed(summary: String, at: DateTime<Utc>) -> Self {
        Self {
            summary: Some(Some(summary)),
            summary_status: Some(SummaryStatus::Completed),
            summary_date: Some(Some(at)),
            ..Self::default()
        }
    }

    pub fn failed(diagnostic: String, at: DateTime<Utc>) -> Self {
        Self {
            summary: Some(Some(diagnostic)),
            summary_status: Some(SummaryStatus::Failed),
            summary_date: Some(Some(at)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, record: &mut DocumentRecord) {
        if let Some(content) = &self.content {
            record.content = content.clone();
        }
        if let Some(metadata) = &self.metadata {
            record.metadata = metadata.clone();
        }
        if let Some(summary) = &self.summary {
            record.summary = summary.clone();
        }
        if let Some(status) = self.summary_status {
            record.summary_status = status;
        }
        if let Some(date) = self.summary_date {
            record.summary_date = date;
        }
    }
}
