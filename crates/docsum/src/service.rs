//! Ingestion, lookup, re-summarization, conversion and deletion of documents.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::UploadConfig;
use crate::convert::Converter;
use crate::document::{DocumentId, DocumentPatch, DocumentRecord, Provenance};
use crate::error::{ServiceError, StorageError};
use crate::extract::ExtractorRegistry;
use crate::format::{extension_of, TargetFormat};
use crate::sanitize::redact_path;
use crate::storage::UploadStorage;
use crate::store::{MetadataStore, TransitionResult};
use crate::summary::SummaryStatus;
use crate::worker::{ShutdownHandle, SummaryJob, WorkerPool};

/// Diagnostic left on documents whose job died with the process.
pub const INTERRUPTED_DIAGNOSTIC: &str = "Summary generation interrupted";

/// Raw bytes of one uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub bytes: Vec<u8>,
    /// Guessed from `original_name` when absent.
    pub mime_type: Option<String>,
}

impl Upload {
    pub fn new(original_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes,
            mime_type: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path).map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(original_name, bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub id: DocumentId,
    pub status: SummaryStatus,
    pub summary: Option<String>,
    pub summary_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetriggerOutcome {
    /// Reset to `Pending`; a job has been (or will be, once workers run) queued.
    Queued,
    /// A job is already queued or running; nothing was changed.
    AlreadyActive(SummaryStatus),
}

#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Documents moved from `Processing` to `Failed`.
    pub interrupted: usize,
    /// `Pending` documents handed to the worker pool.
    pub requeued: usize,
}

pub struct DocumentService {
    store: Arc<dyn MetadataStore>,
    extractors: ExtractorRegistry,
    converter: Converter,
    storage: UploadStorage,
    upload: UploadConfig,
    pool: Option<WorkerPool>,
}

impl DocumentService {
    /// A service without workers. Documents stay `Pending` until a pool is attached.
    pub fn new(store: Arc<dyn MetadataStore>, storage: UploadStorage, upload: UploadConfig) -> Self {
        Self {
            store,
            extractors: ExtractorRegistry::new(),
            converter: Converter::new(),
            storage,
            upload,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    pub fn shutdown_handle(&self) -> Option<ShutdownHandle> {
        self.pool.as_ref().map(WorkerPool::shutdown_handle)
    }

    /// Validates, stores, extracts and records one upload, then queues its summary.
    ///
    /// Extraction failures do not fail the call: the record is kept as `Failed`
    /// with the extraction diagnostic.
    pub fn ingest(&self, upload: Upload) -> Result<DocumentRecord, ServiceError> {
        let extension = extension_of(&upload.original_name);
        if !self.upload.allows(&extension) || !self.extractors.supports_extension(&extension) {
            return Err(ServiceError::UnsupportedFormat(extension));
        }

        let size_bytes = upload.bytes.len() as u64;
        if size_bytes > self.upload.max_file_size {
            return Err(ServiceError::FileTooLarge {
                name: upload.original_name,
                size: size_bytes,
                limit: self.upload.max_file_size,
            });
        }

        let stored_path = self.storage.store(&upload.bytes, &extension)?;
        let _span = tracing::info_span!(
            "ingest",
            file = %redact_path(&stored_path),
            format = %extension,
            bytes = size_bytes
        )
        .entered();

        let mime_type = upload.mime_type.unwrap_or_else(|| {
            mime_guess::from_path(&upload.original_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        let provenance = Provenance {
            id: DocumentId::generate(),
            original_name: upload.original_name,
            stored_path: stored_path.clone(),
            size_bytes,
            mime_type,
        };

        let now = Utc::now();
        let record = match self.extractors.extract(&upload.bytes, &extension) {
            Ok(extracted) => DocumentRecord::ingested(provenance, extracted, now),
            Err(e) => {
                warn!("Extraction failed for {}: {}", provenance.original_name, e);
                DocumentRecord::extraction_failed(provenance, &e, now)
            }
        };

        if let Err(e) = self.store.put(&record) {
            if let Err(cleanup) = self.storage.remove(&stored_path) {
                warn!("Failed to remove orphaned upload: {}", cleanup);
            }
            return Err(e.into());
        }

        info!(
            "Ingested {} as {} ({})",
            record.original_name, record.id, record.summary_status
        );

        if record.summary_status == SummaryStatus::Pending {
            if let Err(e) = self.enqueue(&record.id) {
                // The record stays Pending; startup recovery queues it again.
                warn!("Could not queue summary for {}: {}", record.id, e);
            }
        }

        Ok(record)
    }

    /// Ingests each upload independently; one bad file never fails its siblings.
    pub fn ingest_batch(&self, uploads: Vec<Upload>) -> Vec<Result<DocumentRecord, ServiceError>> {
        uploads.into_iter().map(|u| self.ingest(u)).collect()
    }

    pub fn get(&self, id: &DocumentId) -> Result<DocumentRecord, ServiceError> {
        self.store
            .get(id)?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    /// All documents, newest upload first.
    pub fn list(&self) -> Result<Vec<DocumentRecord>, ServiceError> {
        let mut records = Vec::new();
        for id in self.store.list_ids_by_recency()? {
            // Deleted between the two reads.
            if let Some(record) = self.store.get(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn summary_status(&self, id: &DocumentId) -> Result<SummaryView, ServiceError> {
        let record = self.get(id)?;
        Ok(SummaryView {
            id: record.id,
            status: record.summary_status,
            summary: record.summary,
            summary_date: record.summary_date,
        })
    }

    /// Resets a finished document to `Pending` and queues a new job.
    ///
    /// A document whose job is still queued or running is left untouched.
    pub fn retrigger_summary(&self, id: &DocumentId) -> Result<RetriggerOutcome, ServiceError> {
        let record = self.get(id)?;
        if !record.has_content() {
            return Err(ServiceError::EmptyContent(id.clone()));
        }

        match self
            .store
            .transition(id, &SummaryStatus::RETRIGGERABLE, &DocumentPatch::pending())?
        {
            TransitionResult::Applied => {
                info!("Summary re-triggered for {}", id);
                self.enqueue(id)?;
                Ok(RetriggerOutcome::Queued)
            }
            TransitionResult::Rejected(status) => {
                debug!("Summary for {} already {}", id, status);
                Ok(RetriggerOutcome::AlreadyActive(status))
            }
            TransitionResult::Missing => Err(ServiceError::NotFound(id.clone())),
        }
    }

    /// Removes the record, then its stored upload. An upload that cannot be
    /// removed is logged and left behind.
    pub fn delete(&self, id: &DocumentId) -> Result<(), ServiceError> {
        let record = self.get(id)?;
        if !self.store.delete(id)? {
            return Err(ServiceError::NotFound(id.clone()));
        }
        if let Err(e) = self.storage.remove(&record.stored_path) {
            warn!("Document {} deleted but its upload was kept: {}", id, e);
        }
        info!("Deleted document {}", id);
        Ok(())
    }

    /// Renders the stored upload as `target`, named `<original stem>.<target>`.
    pub fn convert(
        &self,
        id: &DocumentId,
        target: TargetFormat,
    ) -> Result<ConvertedFile, ServiceError> {
        let record = self.get(id)?;
        let bytes = self.storage.read(&record.stored_path)?;
        let source_extension = extension_of(&record.original_name);

        let converted = self.converter.convert(&bytes, &source_extension, target)?;

        let stem = Path::new(&record.original_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string());

        Ok(ConvertedFile {
            file_name: format!("{}.{}", stem, target.extension()),
            mime_type: target.mime_type(),
            bytes: converted,
        })
    }

    /// Fails documents left `Processing` by an earlier run and re-queues every
    /// `Pending` one.
    pub fn recover(&self) -> Result<RecoveryReport, ServiceError> {
        let mut report = RecoveryReport::default();

        for id in self.store.ids_with_status(SummaryStatus::Processing)? {
            let patch = DocumentPatch::failed(INTERRUPTED_DIAGNOSTIC.to_string(), Utc::now());
            if self
                .store
                .transition(&id, &[SummaryStatus::Processing], &patch)?
                .is_applied()
            {
                report.interrupted += 1;
            }
        }

        if self.pool.is_some() {
            for id in self.store.ids_with_status(SummaryStatus::Pending)? {
                self.enqueue(&id)?;
                report.requeued += 1;
            }
        }

        if report.interrupted > 0 || report.requeued > 0 {
            info!(
                "Recovery: {} interrupted, {} re-queued",
                report.interrupted, report.requeued
            );
        }
        Ok(report)
    }

    /// Polls the store until none of `ids` is `Pending` or `Processing`.
    ///
    /// Returns `false` if `timeout` elapsed first. Deleted documents count as settled.
    pub fn wait_until_settled(
        &self,
        ids: &[DocumentId],
        timeout: Duration,
    ) -> Result<bool, ServiceError> {
        // An unrepresentable deadline waits without limit.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let mut active = false;
            for id in ids {
                if let Some(record) = self.store.get(id)? {
                    active |= record.summary_status.is_active();
                }
            }
            if !active {
                return Ok(true);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Stops the workers and waits for in-flight jobs.
    pub fn shutdown(self) {
        if let Some(pool) = self.pool {
            pool.shutdown();
            pool.wait();
        }
    }

    fn enqueue(&self, id: &DocumentId) -> Result<(), ServiceError> {
        match &self.pool {
            Some(pool) => {
                pool.submit(SummaryJob::new(id.clone()))?;
                debug!("Queued summary job for {}", id);
            }
            None => debug!("No workers running, {} stays pending", id),
        }
        Ok(())
    }
}
