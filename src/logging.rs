//! Structured logging setup.
//!
//! JSON formatting for production, pretty formatting for development, with
//! optional rotated file output. Log destination and format are selected
//! through `LICENSE_MANIFEST_LOG_*` environment variables.

use anyhow::{Context, Result};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for logging setup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for log files (when output is "file")
    pub log_dir: PathBuf,
    pub log_file_prefix: String,
    pub environment: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging (production)
    Json,
    /// Human-readable pretty output (development)
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily-rotated file under `log_dir`
    File,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let is_production = environment == "production" || environment == "prod";

        Self {
            format: if is_production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "license-manifest".to_string(),
            environment,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(format) = env::var("LICENSE_MANIFEST_LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => config.format,
            };
        }

        if let Ok(output) = env::var("LICENSE_MANIFEST_LOG_OUTPUT") {
            config.output = match output.to_lowercase().as_str() {
                "stdout" => LogOutput::Stdout,
                "stderr" => LogOutput::Stderr,
                "file" => LogOutput::File,
                _ => config.output,
            };
        }

        if let Ok(log_dir) = env::var("LICENSE_MANIFEST_LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        config
    }
}

/// Initialize structured logging with the given configuration.
///
/// Returns a WorkerGuard that must be held for the lifetime of the
/// application to ensure all logs are flushed.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if config.environment == "production" || config.environment == "prod" {
            "info"
        } else {
            "debug"
        };
        EnvFilter::new(default_level)
    });

    let (writer, guard) = match config.output {
        LogOutput::Stdout => {
            let (non_blocking, guard) = tracing_appender::non_blocking(io::stdout());
            (non_blocking, Some(guard))
        }
        LogOutput::Stderr => {
            let (non_blocking, guard) = tracing_appender::non_blocking(io::stderr());
            (non_blocking, Some(guard))
        }
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;
            let file_appender =
                tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (non_blocking, Some(guard))
        }
    };

    let registry = tracing_subscriber::registry();

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_level(true)
                .with_filter(env_filter);
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_target(false)
                .with_level(true)
                .with_ansi(true)
                .with_filter(env_filter);
            registry.with(fmt_layer).init();
        }
    }

    Ok(guard)
}
