pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod extract;
pub mod format;
pub mod logging;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod storage;
pub mod store;
pub mod summary;
pub mod worker;

#[cfg(test)]
mod test_fixtures;

pub use config::{load_config, Config};
pub use convert::Converter;
pub use document::{DocumentId, DocumentPatch, DocumentRecord};
pub use error::{
    ConfigError, ConvertError, DocsumError, ExtractError, Result, ServiceError, StorageError,
    WorkerError,
};
pub use extract::{ExtractMetadata, Extracted, ExtractorRegistry};
pub use logging::LoggingError;
pub use format::{DocumentFormat, TargetFormat};
pub use service::{ConvertedFile, DocumentService, RetriggerOutcome, SummaryView, Upload};
pub use storage::UploadStorage;
pub use store::{MemoryStore, MetadataStore, SqliteStore, StoreError, TransitionResult};
pub use summary::{ChatCompletionsSummarizer, Summarizer, SummaryStatus, SummaryWorker};
pub use worker::{SummaryJob, WorkerPool};
