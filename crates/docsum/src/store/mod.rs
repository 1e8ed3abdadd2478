//! Persistence for document records.
//!
//! [`MetadataStore`] is the only shared mutable state in the pipeline. Every
//! multi-field write goes through a [`DocumentPatch`] and lands atomically, and
//! status changes use [`MetadataStore::transition`] so that concurrent writers
//! cannot move a record along an edge it is no longer on.

use std::path::PathBuf;

pub mod error;
pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use crate::document::DocumentPatch;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::document::{DocumentId, DocumentRecord};
use crate::summary::SummaryStatus;

/// Result of a conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Applied,
    /// The record exists but its status was not one of the expected sources.
    Rejected(SummaryStatus),
    Missing,
}

impl TransitionResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub trait MetadataStore: Send + Sync {
    /// Inserts a record, replacing any existing record with the same id.
    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError>;

    /// Applies `patch` atomically. Returns `false` when the record does not exist.
    fn update_fields(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<bool, StoreError>;

    /// Applies `patch` only if the record's current status is one of `from`.
    fn transition(
        &self,
        id: &DocumentId,
        from: &[SummaryStatus],
        patch: &DocumentPatch,
    ) -> Result<TransitionResult, StoreError>;

    fn delete(&self, id: &DocumentId) -> Result<bool, StoreError>;

    /// Ids ordered newest upload first; ties go to the most recently inserted.
    fn list_ids_by_recency(&self) -> Result<Vec<DocumentId>, StoreError>;

    fn ids_with_status(&self, status: SummaryStatus) -> Result<Vec<DocumentId>, StoreError>;
}

/// Returns the canonical database path: `~/.docsum/data/docsum.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docsum").join("data").join("docsum.db"))
}
