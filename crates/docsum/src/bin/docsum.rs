use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{info, warn};

use docsum::config::{load_config, Config};
use docsum::error::{ConfigError, DocsumError};
use docsum::service::{DocumentService, RetriggerOutcome, Upload};
use docsum::storage::UploadStorage;
use docsum::store::{MetadataStore, SqliteStore};
use docsum::summary::{ChatCompletionsSummarizer, Summarizer, SummaryWorker};
use docsum::worker::WorkerPool;
use docsum::{DocumentId, TargetFormat};

#[derive(Parser)]
#[command(name = "docsum", version, about = "Ingest documents, extract text and summarize them")]
struct Cli {
    /// Config file. Defaults to ~/.docsum/config.json when it exists.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files and wait for their summaries.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List documents, newest first.
    List,
    /// Print a document record as JSON.
    Show { id: String },
    /// Print the summary state of a document.
    Summary { id: String },
    /// Generate a new summary for a finished document.
    Resummarize { id: String },
    /// Export a document as txt, csv or json.
    Convert {
        id: String,
        format: TargetFormat,
        /// Output path. Defaults to `<original name>.<format>` in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a document and its stored upload.
    Delete { id: String },
    /// Recover interrupted work and keep the workers running until Ctrl-C.
    Run,
}

impl Command {
    fn needs_workers(&self) -> bool {
        matches!(self, Self::Ingest { .. } | Self::Resummarize { .. } | Self::Run)
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = docsum::logging::init_tracing(cli.json_logs) {
        eprintln!("warning: {}", e);
    }

    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), DocsumError> {
    let config = resolve_config(cli.config.as_deref())?;
    let service = build_service(&config, cli.command.needs_workers())?;
    let settle_timeout = config.summarization.timeout() * 2 + Duration::from_secs(5);

    let result = execute(&service, cli.command, settle_timeout);
    service.shutdown();
    result
}

fn execute(
    service: &DocumentService,
    command: Command,
    settle_timeout: Duration,
) -> Result<(), DocsumError> {
    match command {
        Command::Ingest { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                match Upload::from_path(path) {
                    Ok(upload) => uploads.push(upload),
                    Err(e) => eprintln!("{}: {}", path.display(), e),
                }
            }

            let mut queued = Vec::new();
            for result in service.ingest_batch(uploads) {
                match result {
                    Ok(record) => {
                        println!(
                            "{}\t{}\t{}",
                            record.id, record.summary_status, record.original_name
                        );
                        if record.summary_status.is_active() {
                            queued.push(record.id);
                        }
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }

            if !queued.is_empty() && service.pool().is_some() {
                let timeout = settle_timeout.saturating_mul(queued.len() as u32);
                if !service.wait_until_settled(&queued, timeout)? {
                    warn!("Some summaries are still pending; `docsum run` will finish them");
                }
                for id in &queued {
                    let view = service.summary_status(id)?;
                    println!("{}\t{}", view.id, view.status);
                }
            }
        }
        Command::List => {
            for record in service.list()? {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.id,
                    record.summary_status,
                    record.upload_date.format("%Y-%m-%d %H:%M:%S"),
                    record.original_name
                );
            }
        }
        Command::Show { id } => {
            let record = service.get(&DocumentId::from(id))?;
            print_json(&record)?;
        }
        Command::Summary { id } => {
            let view = service.summary_status(&DocumentId::from(id))?;
            print_json(&view)?;
        }
        Command::Resummarize { id } => {
            let id = DocumentId::from(id);
            match service.retrigger_summary(&id)? {
                RetriggerOutcome::Queued => {
                    let settled = service.pool().is_none()
                        || service.wait_until_settled(&[id.clone()], settle_timeout)?;
                    if !settled {
                        warn!("Summary for {} is still pending", id);
                    }
                    print_json(&service.summary_status(&id)?)?;
                }
                RetriggerOutcome::AlreadyActive(status) => {
                    println!("Summary for {} is already {}", id, status);
                }
            }
        }
        Command::Convert { id, format, output } => {
            let converted = service.convert(&DocumentId::from(id), format)?;
            let output = output.unwrap_or_else(|| PathBuf::from(&converted.file_name));
            std::fs::write(&output, &converted.bytes).map_err(|e| {
                docsum::StorageError::WriteFile {
                    path: output.clone(),
                    source: e,
                }
            })?;
            println!("{}", output.display());
        }
        Command::Delete { id } => {
            service.delete(&DocumentId::from(id))?;
        }
        Command::Run => run_workers(service)?,
    }

    Ok(())
}

fn run_workers(service: &DocumentService) -> Result<(), DocsumError> {
    let Some(pool) = service.pool() else {
        warn!("Summarization is disabled; nothing to run");
        return Ok(());
    };

    let handle = pool.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handle.shutdown();
    })?;

    let report = service.recover()?;
    info!(
        "Workers running ({} re-queued, {} interrupted). Press Ctrl-C to stop.",
        report.requeued, report.interrupted
    );

    while !pool.is_shutdown() {
        if let Some(result) = pool.recv_result_timeout(Duration::from_millis(500)) {
            match result.outcome {
                Ok(outcome) => info!("Job for {} finished: {:?}", result.document_id, outcome),
                Err(e) => warn!("Job for {} failed: {}", result.document_id, e),
            }
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }
    match Config::default_path() {
        Some(path) if path.exists() => load_config(path),
        _ => Ok(Config::default()),
    }
}

fn build_service(config: &Config, with_workers: bool) -> Result<DocumentService, DocsumError> {
    let database_path = config.database_path().ok_or_else(|| ConfigError::Validation {
        message: "Could not determine database path; set databasePath".to_string(),
    })?;
    let store: Arc<dyn MetadataStore> = Arc::new(SqliteStore::open(&database_path)?);

    let service = DocumentService::new(
        Arc::clone(&store),
        UploadStorage::new(&config.upload_directory),
        config.upload.clone(),
    );

    if !with_workers || !config.summarization.enabled {
        return Ok(service);
    }

    let summarization = &config.summarization;
    let api_key = summarization.resolve_api_key()?;
    let summarizer: Arc<dyn Summarizer> = Arc::new(
        ChatCompletionsSummarizer::new(
            summarization.api_url.clone(),
            summarization.model.clone(),
            api_key,
            summarization.timeout(),
        )?,
    );

    let worker = Arc::new(SummaryWorker::new(
        store,
        summarizer,
        summarization.worker_settings(),
    ));
    let pool = WorkerPool::new(worker, config.worker_count)?;

    Ok(service.with_pool(pool))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), DocsumError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
