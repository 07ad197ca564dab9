use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{ClientOptions, default_config_dir};

/// Configuration for the logging system
pub struct LogConfig {
    /// Directory where log files will be stored
    pub log_dir: PathBuf,
    /// Prefix for log file names
    pub file_prefix: String,
    /// Maximum number of log files to keep (rotation)
    pub max_files: usize,
    /// Whether to write logs to file
    pub log_to_file: bool,
    /// Log level filter string
    pub log_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        let log_dir = default_config_dir()
            .unwrap_or_else(|_| PathBuf::from(".kotak"))
            .join("logs");

        Self {
            log_dir,
            file_prefix: "kotak-cloud".to_string(),
            max_files: 5,
            log_to_file: false,
            log_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Take level and file settings from client options
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            max_files: options.log_max_files,
            log_to_file: options.log_to_file,
            log_level: options.log_level.as_str().to_string(),
            ..Self::default()
        }
    }
}

/// Initialize the logging system with stdout and optional file output
///
/// # Log Targets
/// - `client` - Uploader facade (submit, resume, remove)
/// - `uploader::pool` - Per-file chunk sequencing
/// - `uploader::retry` - Chunk retries
/// - `uploader::session` - Record lifecycle
/// - `uploader::transport` - Outgoing chunk requests
/// - `events` - Event broadcasting
/// - `main` - Application lifecycle
///
/// # Example
/// ```bash
/// RUST_LOG=uploader::pool=debug,uploader::retry=warn my-app
/// ```
pub fn init_logging(config: LogConfig) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Separate branches due to tracing-subscriber's layered types
    let worker_guard = if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;

        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_dir)
            .context("Failed to create file appender")?;
        let (non_blocking_file, worker_guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .compact()
            .with_writer(non_blocking_file)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

        let stdout_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;

        worker_guard
    } else {
        let (non_blocking_sink, worker_guard) = tracing_appender::non_blocking(std::io::sink());
        drop(non_blocking_sink);

        let stdout_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;

        worker_guard
    };

    tracing::info!(
        target: "main",
        log_dir = %config.log_dir.display(),
        max_files = config.max_files,
        log_to_file = config.log_to_file,
        log_level = %config.log_level,
        "Logging system initialized"
    );

    Ok(LogGuard {
        _worker_guard: worker_guard,
    })
}

/// Keeps the file writer alive; logs are flushed when dropped
pub struct LogGuard {
    _worker_guard: tracing_appender::non_blocking::WorkerGuard,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        tracing::info!(target: "main", "Flushing logs before shutdown");
    }
}
