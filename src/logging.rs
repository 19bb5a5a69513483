//! Tracing subscriber setup.
//!
//! Console output always goes to stderr. A daily rolling log file under
//! `~/.catalog-uploader/logs` can be added; its guard must be kept alive for
//! the file writer to flush.

use crate::config_utils::get_logs_dir;
use crate::error::UploadError;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "catalog_uploader=info";
const LOG_FILE_PREFIX: &str = "uploader.log";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Also write to a rolling file in this directory
    pub file_dir: Option<PathBuf>,
}

impl LogOptions {
    /// Log to the default logs directory in addition to stderr
    pub fn with_default_file() -> Result<Self, UploadError> {
        Ok(Self {
            json: false,
            file_dir: Some(get_logs_dir()?),
        })
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Returns the file writer guard, if any.
///
/// Calling this twice is harmless; the second install is ignored.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, UploadError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true);

    match options.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            let writer = std::io::stderr.and(file_writer);

            let result = if options.json {
                builder.json().with_writer(writer).try_init()
            } else {
                builder.with_writer(writer).try_init()
            };
            if let Err(e) = result {
                eprintln!("[WARN] Logging already initialized: {}", e);
            }
            Ok(Some(guard))
        }
        None => {
            let result = if options.json {
                builder.json().with_writer(std::io::stderr).try_init()
            } else {
                builder.with_writer(std::io::stderr).try_init()
            };
            if let Err(e) = result {
                eprintln!("[WARN] Logging already initialized: {}", e);
            }
            Ok(None)
        }
    }
}
