//! Tracing subscriber setup for the `docsum` binary.
//!
//! Library code logs through `log` macros and `tracing` spans. Both end up in
//! the subscriber installed here; `log` records are bridged by `LogTracer`.

use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_log::log::SetLoggerError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),

    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] SetLoggerError),
}

/// Installs the global subscriber. Filtering follows `RUST_LOG` and defaults to
/// `info`. With `json` set, events are written as one JSON object per line.
///
/// Fails if a global subscriber or logger is already installed.
pub fn init_tracing(json: bool) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        let layer = fmt::layer().json().with_current_span(true).with_target(true);
        tracing::subscriber::set_global_default(registry.with(layer))?;
    } else {
        let layer = fmt::layer().with_target(false).compact();
        tracing::subscriber::set_global_default(registry.with(layer))?;
    }

    tracing_log::LogTracer::init()?;
    Ok(())
}
