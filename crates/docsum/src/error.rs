use std::path::PathBuf;
use thiserror::Error;

use crate::document::DocumentId;
use crate::format::{DocumentFormat, TargetFormat};
use crate::store::StoreError;
use crate::summary::SummarizerError;

#[derive(Error, Debug)]
pub enum DocsumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Summarization client error: {0}")]
    Summarizer(#[from] SummarizerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Environment variable '{var}' holding the summarization API key is not set")]
    MissingSecret { var: String },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Failed to extract {format} content: {reason}")]
    Extraction {
        format: DocumentFormat,
        reason: String,
    },
}

impl ExtractError {
    pub fn extraction(format: DocumentFormat, reason: impl Into<String>) -> Self {
        Self::Extraction {
            format,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Unsupported source format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Cannot convert {from} documents to {to}")]
    UnsupportedConversion {
        from: DocumentFormat,
        to: TargetFormat,
    },

    #[error("Unknown target format: '{0}'")]
    UnknownTarget(String),

    #[error(transparent)]
    Extraction(ExtractError),

    #[error("Failed to render {target} output: {reason}")]
    Render { target: TargetFormat, reason: String },
}

impl From<ExtractError> for ConvertError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(ext) => ConvertError::UnsupportedFormat(ext),
            other => ConvertError::Extraction(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to start worker runtime: {0}")]
    Runtime(String),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Unsupported file type '{0}'. Allowed: txt, md, pdf, docx, xlsx, xls")]
    UnsupportedFormat(String),

    #[error("File '{name}' is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("Document {0} has no extracted content to summarize")]
    EmptyContent(DocumentId),

    #[error("Conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to enqueue summary job: {0}")]
    Queue(#[from] WorkerError),
}

pub type Result<T> = std::result::Result<T, DocsumError>;
