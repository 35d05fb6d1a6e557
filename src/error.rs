//! Failure taxonomy for manifest aggregation.
//!
//! Every variant is terminal: the run aborts on the first error, the
//! destination file is left untouched, and the variant carries enough context
//! (section title, program name, underlying error) to diagnose which step
//! failed.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for aggregation operations
pub type AggregationResult<T> = Result<T, AggregationError>;

#[derive(Debug, Error)]
pub enum AggregationError {
    /// The manifest was configured with zero sections.
    #[error("manifest has no sections; refusing to write an empty file")]
    EmptyManifest,

    /// A static file section's path does not exist or is unreadable.
    #[error("section '{section}': cannot read asset {}", .path.display())]
    MissingAsset {
        section: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A command section's process failed to launch, exited non-zero, or
    /// outlived its deadline.
    #[error("section '{section}': external tool '{program}' {reason}")]
    ExternalToolFailure {
        section: String,
        program: String,
        reason: ToolFailureReason,
    },

    /// The destination could not be created or renamed into place.
    #[error("cannot write manifest to {}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Preflight only: the installed tool does not report the pinned version.
    #[error("tool '{program}' version mismatch: expected '{expected}', found '{found}'")]
    VersionMismatch {
        program: String,
        expected: String,
        found: String,
    },
}

impl AggregationError {
    /// Short static category for structured logging.
    pub fn category(&self) -> &'static str {
        match self {
            AggregationError::EmptyManifest => "config_error",
            AggregationError::MissingAsset { .. } => "missing_asset",
            AggregationError::ExternalToolFailure { .. } => "external_tool",
            AggregationError::WriteError { .. } => "write_error",
            AggregationError::VersionMismatch { .. } => "version_mismatch",
        }
    }
}

/// How a command section's process failed.
#[derive(Debug)]
pub enum ToolFailureReason {
    /// The process could not be spawned.
    Launch(io::Error),
    /// The process ran to completion with a non-zero exit status. Captured
    /// standard error is propagated as diagnostic context.
    NonZeroExit {
        status: Option<i32>,
        stderr: String,
    },
    /// The process was still running when the configured deadline expired.
    TimedOut { limit: Duration },
}

impl fmt::Display for ToolFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailureReason::Launch(err) => write!(f, "failed to launch: {err}"),
            ToolFailureReason::NonZeroExit { status, stderr } => {
                match status {
                    Some(code) => write!(f, "exited with status {code}")?,
                    None => write!(f, "was terminated by a signal")?,
                }
                let stderr = stderr.trim_end();
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            ToolFailureReason::TimedOut { limit } => {
                write!(f, "timed out after {}s", limit.as_secs_f64())
            }
        }
    }
}
