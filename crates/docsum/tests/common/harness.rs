//! Test harness for isolated service execution.
//!
//! The `TestHarness` struct provides:
//! - A temporary upload directory
//! - An in-memory store wrapped in a `RecordingStore`
//! - A `DocumentService`, optionally with a worker pool driven by `StubSummarizer`

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tempfile::TempDir;
use tokio::sync::Notify;

use docsum::config::UploadConfig;
use docsum::document::{DocumentId, DocumentPatch, DocumentRecord};
use docsum::service::{DocumentService, Upload};
use docsum::storage::UploadStorage;
use docsum::store::{MemoryStore, MetadataStore, StoreError, TransitionResult};
use docsum::summary::{Summarizer, SummarizerError, SummaryRequest, SummaryStatus, SummaryWorker, WorkerSettings};
use docsum::worker::WorkerPool;

/// One observed status change: `(document, from, to)`.
pub type Edge = (DocumentId, SummaryStatus, SummaryStatus);

/// Wraps a store and records every status change written through it.
///
/// Writes are serialized by one lock so the recorded `from` state is exact.
pub struct RecordingStore<S> {
    inner: S,
    edges: Mutex<Vec<Edge>>,
}

impl<S: MetadataStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            edges: Mutex::new(Vec::new()),
        }
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.edges.lock().unwrap().clone()
    }

    pub fn edges_for(&self, id: &DocumentId) -> Vec<(SummaryStatus, SummaryStatus)> {
        self.edges()
            .into_iter()
            .filter(|(doc, _, _)| doc == id)
            .map(|(_, from, to)| (from, to))
            .collect()
    }

    fn record_change(
        &self,
        edges: &mut Vec<Edge>,
        id: &DocumentId,
        before: Option<SummaryStatus>,
        patch: &DocumentPatch,
    ) {
        if let (Some(from), Some(to)) = (before, patch.summary_status) {
            if from != to {
                edges.push((id.clone(), from, to));
            }
        }
    }
}

impl<S: MetadataStore> MetadataStore for RecordingStore<S> {
    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let _guard = self.edges.lock().unwrap();
        self.inner.put(record)
    }

    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        self.inner.get(id)
    }

    fn update_fields(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<bool, StoreError> {
        let mut edges = self.edges.lock().unwrap();
        let before = self.inner.get(id)?.map(|r| r.summary_status);
        let updated = self.inner.update_fields(id, patch)?;
        if updated {
            self.record_change(&mut edges, id, before, patch);
        }
        Ok(updated)
    }

    fn transition(
        &self,
        id: &DocumentId,
        from: &[SummaryStatus],
        patch: &DocumentPatch,
    ) -> Result<TransitionResult, StoreError> {
        let mut edges = self.edges.lock().unwrap();
        let before = self.inner.get(id)?.map(|r| r.summary_status);
        let result = self.inner.transition(id, from, patch)?;
        if result.is_applied() {
            self.record_change(&mut edges, id, before, patch);
        }
        Ok(result)
    }

    fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        let _guard = self.edges.lock().unwrap();
        self.inner.delete(id)
    }

    fn list_ids_by_recency(&self) -> Result<Vec<DocumentId>, StoreError> {
        self.inner.list_ids_by_recency()
    }

    fn ids_with_status(&self, status: SummaryStatus) -> Result<Vec<DocumentId>, StoreError> {
        self.inner.ids_with_status(status)
    }
}

#[derive(Clone)]
pub enum StubBehavior {
    Reply(String),
    ApiError(u16),
    /// Never answers.
    Hang,
    /// Signals that it started, then answers once `release()` is called.
    Gated(String),
}

pub struct StubSummarizer {
    behavior: Mutex<StubBehavior>,
    calls: AtomicUsize,
    started_tx: Sender<()>,
    started_rx: Receiver<()>,
    release: Notify,
}

impl StubSummarizer {
    pub fn new(behavior: StubBehavior) -> Self {
        let (started_tx, started_rx) = unbounded();
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
            started_tx,
            started_rx,
            release: Notify::new(),
        }
    }

    /// Changes the answer for calls that start from now on.
    pub fn set_behavior(&self, behavior: StubBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Blocks until a call has started. Returns `false` on timeout.
    pub fn wait_started(&self, timeout: Duration) -> bool {
        self.started_rx.recv_timeout(timeout).is_ok()
    }

    /// Lets one gated call answer.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, _request: SummaryRequest) -> Result<String, SummarizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started_tx.send(());

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            StubBehavior::Reply(summary) => Ok(summary),
            StubBehavior::ApiError(status) => Err(SummarizerError::Api {
                status,
                body: "stubbed failure".to_string(),
            }),
            StubBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            }
            StubBehavior::Gated(summary) => {
                self.release.notified().await;
                Ok(summary)
            }
        }
    }
}

/// Test harness providing an isolated service for integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub store: Arc<RecordingStore<MemoryStore>>,
    pub summarizer: Arc<StubSummarizer>,
    pub service: DocumentService,
}

impl TestHarness {
    /// A service without workers: ingested documents stay `Pending`.
    pub fn new() -> Self {
        Self::build(StubBehavior::Reply("unused".to_string()), None)
    }

    /// A service with two workers answering with `behavior`.
    pub fn with_summarizer(behavior: StubBehavior) -> Self {
        Self::with_settings(behavior, WorkerSettings::default())
    }

    pub fn with_settings(behavior: StubBehavior, settings: WorkerSettings) -> Self {
        Self::build(behavior, Some(settings))
    }

    fn build(behavior: StubBehavior, settings: Option<WorkerSettings>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let store = Arc::new(RecordingStore::new(MemoryStore::new()));
        let summarizer = Arc::new(StubSummarizer::new(behavior));

        let mut service = DocumentService::new(
            store.clone(),
            UploadStorage::new(&upload_dir),
            UploadConfig::default(),
        );
        if let Some(settings) = settings {
            let worker = Arc::new(SummaryWorker::new(
                store.clone(),
                summarizer.clone(),
                settings,
            ));
            let pool = WorkerPool::new(worker, 2).expect("Failed to start worker pool");
            service = service.with_pool(pool);
        }

        Self {
            temp_dir,
            upload_dir,
            store,
            summarizer,
            service,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn ingest(&self, name: &str, bytes: Vec<u8>) -> DocumentRecord {
        self.service
            .ingest(Upload::new(name, bytes))
            .expect("Ingestion failed")
    }

    pub fn ingest_text(&self, name: &str, text: &str) -> DocumentRecord {
        self.ingest(name, text.as_bytes().to_vec())
    }

    /// Waits up to five seconds for the document to leave `Pending`/`Processing`.
    pub fn wait_settled(&self, id: &DocumentId) -> DocumentRecord {
        let settled = self
            .service
            .wait_until_settled(std::slice::from_ref(id), Duration::from_secs(5))
            .expect("Store error while waiting");
        assert!(settled, "Document {} did not settle in time", id);
        self.record(id)
    }

    pub fn record(&self, id: &DocumentId) -> DocumentRecord {
        self.store
            .get(id)
            .expect("Store error")
            .expect("Document missing")
    }

    pub fn shutdown(self) {
        self.service.shutdown();
    }
}
