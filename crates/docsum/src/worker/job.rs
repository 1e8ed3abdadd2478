use crate::document::DocumentId;
use crate::error::WorkerError;

/// A request to summarize one document. Everything else is re-read from the
/// store when the job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryJob {
    pub document_id: DocumentId,
}

impl SummaryJob {
    pub fn new(document_id: DocumentId) -> Self {
        Self { document_id }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// A summary was written.
    Completed,
    /// The record was moved to `Failed` with this diagnostic.
    Failed { diagnostic: String },
    /// The document was already summarized or claimed by another job.
    Skipped,
    /// The document was deleted while its summary was being generated.
    Discarded,
}

#[derive(Debug)]
pub struct JobResult {
    pub document_id: DocumentId,
    pub outcome: Result<JobOutcome, WorkerError>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            Ok(JobOutcome::Completed | JobOutcome::Skipped | JobOutcome::Discarded)
        )
    }
}
