//! Drives one document through `Pending → Processing → Completed | Failed`.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tracing::Instrument;

use crate::document::{DocumentId, DocumentPatch, NO_CONTENT_DIAGNOSTIC};
use crate::error::WorkerError;
use crate::store::{MetadataStore, TransitionResult};
use crate::summary::client::{Summarizer, SummarizerError, SummaryRequest};
use crate::summary::SummaryStatus;
use crate::worker::JobOutcome;

/// Appended to content that was cut to fit the character budget.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Prefix of the diagnostic stored when summarization fails.
pub const FAILURE_PREFIX: &str = "Summary generation failed: ";

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Longest summary requested from the API, in characters.
    pub max_length: usize,
    /// Content beyond this many characters is cut before it is sent.
    pub content_char_budget: usize,
    pub timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_length: 300,
            content_char_budget: 4000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Cuts `content` to `budget` characters, never inside a code point, and marks
/// the cut with [`TRUNCATION_MARKER`].
pub fn truncate_content(content: &str, budget: usize) -> Cow<'_, str> {
    match content.char_indices().nth(budget) {
        Some((byte_index, _)) => {
            Cow::Owned(format!("{}{}", &content[..byte_index], TRUNCATION_MARKER))
        }
        None => Cow::Borrowed(content),
    }
}

pub struct SummaryWorker {
    store: Arc<dyn MetadataStore>,
    summarizer: Arc<dyn Summarizer>,
    settings: WorkerSettings,
}

impl SummaryWorker {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        summarizer: Arc<dyn Summarizer>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            summarizer,
            settings,
        }
    }

    /// Runs one summary job to completion.
    ///
    /// Every job that claims a document leaves it `Completed` or `Failed`. A job
    /// that finds the document already summarized, claimed elsewhere, or failed
    /// without re-trigger does nothing and reports [`JobOutcome::Skipped`].
    pub async fn process(&self, id: &DocumentId) -> Result<JobOutcome, WorkerError> {
        let span = tracing::info_span!("summarize", document_id = %id);
        self.run(id).instrument(span).await
    }

    async fn run(&self, id: &DocumentId) -> Result<JobOutcome, WorkerError> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| WorkerError::NotFound(id.clone()))?;

        if record.summary_status == SummaryStatus::Completed {
            debug!("Document {} already summarized", id);
            return Ok(JobOutcome::Skipped);
        }

        match self
            .store
            .transition(id, &[SummaryStatus::Pending], &DocumentPatch::processing())?
        {
            TransitionResult::Applied => {}
            TransitionResult::Rejected(status) => {
                debug!("Document {} is {}, not claiming", id, status);
                return Ok(JobOutcome::Skipped);
            }
            TransitionResult::Missing => return Ok(JobOutcome::Skipped),
        }

        if record.content.is_empty() {
            return self.finish_failed(id, NO_CONTENT_DIAGNOSTIC.to_string());
        }

        let request = SummaryRequest {
            content: truncate_content(&record.content, self.settings.content_char_budget)
                .into_owned(),
            max_length: self.settings.max_length,
        };

        let result = match tokio::time::timeout(
            self.settings.timeout,
            self.summarizer.summarize(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SummarizerError::Timeout(self.settings.timeout)),
        };

        match result {
            Ok(summary) if !summary.trim().is_empty() => {
                let patch = DocumentPatch::completed(summary, Utc::now());
                match self.write_back(id, &patch)? {
                    Some(()) => {
                        info!("Summary completed for document {}", id);
                        Ok(JobOutcome::Completed)
                    }
                    None => Ok(JobOutcome::Discarded),
                }
            }
            Ok(_) => self.finish_failed(
                id,
                format!("{}summarization API returned an empty summary", FAILURE_PREFIX),
            ),
            Err(e) => self.finish_failed(id, format!("{}{}", FAILURE_PREFIX, e)),
        }
    }

    fn finish_failed(&self, id: &DocumentId, diagnostic: String) -> Result<JobOutcome, WorkerError> {
        let patch = DocumentPatch::failed(diagnostic.clone(), Utc::now());
        match self.write_back(id, &patch)? {
            Some(()) => {
                warn!("Summary failed for document {}: {}", id, diagnostic);
                Ok(JobOutcome::Failed { diagnostic })
            }
            None => Ok(JobOutcome::Discarded),
        }
    }

    /// Commits the final patch. `None` means the document vanished mid-flight.
    fn write_back(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<Option<()>, WorkerError> {
        match self
            .store
            .transition(id, &[SummaryStatus::Processing], patch)?
        {
            TransitionResult::Applied => Ok(Some(())),
            TransitionResult::Missing => {
                info!("Document {} was deleted during summarization", id);
                Ok(None)
            }
            TransitionResult::Rejected(status) => {
                warn!(
                    "Document {} moved to {} during summarization, result dropped",
                    id, status
                );
                Ok(None)
            }
        }
    }
}
