//! Logging/tracing setup
//!
//! Console output is always on. When `[logging] file` is set, records are
//! also written to a daily-rolling file through a non-blocking writer. If the
//! file side cannot be set up the process keeps running with console logging
//! and says so.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Error setting up file logging
#[derive(Debug, thiserror::Error)]
pub enum LogFileError {
    #[error("log file path {0:?} has no file name")]
    NoFileName(std::path::PathBuf),
    #[error("failed to create log directory {path:?}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),
}

/// Initialize the logging/tracing infrastructure
///
/// The returned guard must be kept alive for the duration of the program so
/// buffered records reach the log file.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = build_filter(&config.level);

    let Some(ref file) = config.file else {
        init_console_logging(tracing_subscriber::registry().with(env_filter), &config.format);
        return None;
    };

    match create_file_writer(file, config.max_files) {
        Ok((writer, guard)) => {
            init_both_logging(
                tracing_subscriber::registry().with(env_filter),
                &config.format,
                writer,
            );
            tracing::info!("Logging initialized. Log file: {:?}", file);
            Some(guard)
        }
        Err(e) => {
            eprintln!("Error setting up logging: {}", e);
            eprintln!("Attempted log file path: {:?}", file);

            // Fallback to plain console logging at info
            init_console_logging(
                tracing_subscriber::registry().with(EnvFilter::new("info")),
                &config.format,
            );
            tracing::warn!(
                "Failed to setup file logging. Falling back to console logging. Error: {}",
                e
            );
            None
        }
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Create a daily-rolling file writer for `file`
pub fn create_file_writer(
    file: &Path,
    max_files: usize,
) -> Result<(NonBlocking, WorkerGuard), LogFileError> {
    let prefix = file
        .file_name()
        .ok_or_else(|| LogFileError::NoFileName(file.to_path_buf()))?;

    let dir = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(|source| LogFileError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix.to_string_lossy());
    if max_files > 0 {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(dir)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize console-only logging
fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
    }
}

/// Initialize both console and file logging
fn init_both_logging<S>(subscriber: S, format: &LogFormat, writer: NonBlocking)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    match format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true)) // Console
                .with(fmt::layer().json().with_target(true).with_writer(writer)) // File
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false)) // Console
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                ) // File
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(fmt::layer().with_target(true)) // Console
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer),
                ) // File
                .init();
        }
    }
}
