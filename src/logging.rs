//! Logging setup for the trainer.
//!
//! Installs a tracing subscriber that writes to the console and to
//! `<log dir>/logs.log`. The file writer is non-blocking; its worker guard
//! lives in the returned [`LoggingContext`], and dropping the context flushes
//! whatever is still buffered.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::config::LOG_FILE;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "house_rent=debug";

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create or access the log directory.
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to create the log file.
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Owns the log file writer for as long as the process logs.
#[must_use = "dropping the context stops file logging"]
pub struct LoggingContext {
    log_path: PathBuf,
    _guard: WorkerGuard,
}

impl LoggingContext {
    /// Install console and file logging under `log_dir`
    pub fn init(log_dir: &Path) -> Result<Self, LoggingError> {
        fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDir {
            path: log_dir.to_path_buf(),
            source,
        })?;

        let log_path = log_dir.join(LOG_FILE);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| LoggingError::CreateLogFile {
                path: log_path.clone(),
                source,
            })?;

        let file_appender = rolling::never(log_dir, LOG_FILE);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let console_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(file_writer);

        let subscriber = Registry::default()
            .with(build_env_filter())
            .with(console_layer)
            .with(file_layer);
        tracing::subscriber::set_global_default(subscriber)?;

        tracing::info!(log_file = %log_path.display(), "logging initialized");
        Ok(Self {
            log_path,
            _guard: guard,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
