//! The aggregation pipeline: sections in, one atomically-published manifest
//! out.
//!
//! Sections are processed strictly in list order, one at a time. Every
//! failure is terminal; the destination file is never observable in a
//! partially-written state because the buffer is only published through a
//! temp-file rename after all sections and substitutions have succeeded.

use crate::config::AggregatorConfig;
use crate::error::{AggregationError, AggregationResult, ToolFailureReason};
use crate::manifest::{CommandSpec, Section, SectionSource, apply_substitutions, push_section};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Runs the whole pipeline described by `config`: read or spawn each section
/// in order, concatenate under headers, apply the substitution table, and
/// atomically write the destination.
pub async fn aggregate(config: &AggregatorConfig) -> AggregationResult<()> {
    if config.sections.is_empty() {
        return Err(AggregationError::EmptyManifest);
    }

    let mut buffer = String::new();
    for section in &config.sections {
        let content = section_content(config, section).await?;
        tracing::debug!(section = %section.title, bytes = content.len(), "section aggregated");
        push_section(&mut buffer, &section.title, &content);
    }

    let buffer = apply_substitutions(&buffer, &config.substitutions);

    let destination = config.resolve_path(&config.destination);
    write_atomic(&destination, buffer.as_bytes())?;
    tracing::info!(
        destination = %destination.display(),
        sections = config.sections.len(),
        bytes = buffer.len(),
        "manifest written"
    );
    Ok(())
}

async fn section_content(
    config: &AggregatorConfig,
    section: &Section,
) -> AggregationResult<String> {
    match &section.source {
        SectionSource::File(path) => {
            let path = config.resolve_path(path);
            fs::read_to_string(&path).map_err(|source| AggregationError::MissingAsset {
                section: section.title.clone(),
                path,
                source,
            })
        }
        SectionSource::Command(spec) => {
            let working_dir = match &spec.working_dir {
                Some(dir) => config.resolve_path(dir),
                None => config.working_dir.clone(),
            };
            let output = capture_output(spec, &working_dir, config.command_timeout)
                .await
                .map_err(|reason| AggregationError::ExternalToolFailure {
                    section: section.title.clone(),
                    program: spec.program.clone(),
                    reason,
                })?;
            if !output.status.success() {
                return Err(AggregationError::ExternalToolFailure {
                    section: section.title.clone(),
                    program: spec.program.clone(),
                    reason: ToolFailureReason::NonZeroExit {
                        status: output.status.code(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    },
                });
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
    }
}

/// Spawns the command and captures its output, honoring the optional
/// deadline. Runs the blocking wait on the blocking pool; on timeout the
/// child is abandoned, not killed, which is acceptable for a build-time
/// utility.
pub(crate) async fn capture_output(
    spec: &CommandSpec,
    working_dir: &Path,
    timeout: Option<Duration>,
) -> Result<Output, ToolFailureReason> {
    let program = spec.program.clone();
    let args = spec.args.clone();
    let dir = working_dir.to_path_buf();
    let invocation = tokio::task::spawn_blocking(move || {
        Command::new(&program).args(&args).current_dir(&dir).output()
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, invocation).await {
            Ok(joined) => joined,
            Err(_) => return Err(ToolFailureReason::TimedOut { limit }),
        },
        None => invocation.await,
    };

    joined
        .map_err(|join_error| ToolFailureReason::Launch(std::io::Error::other(join_error)))?
        .map_err(ToolFailureReason::Launch)
}

/// Publishes the buffer through a temp file in the destination's directory
/// followed by an atomic rename. The temp file is discarded on any failure,
/// leaving the destination untouched.
fn write_atomic(destination: &Path, bytes: &[u8]) -> AggregationResult<()> {
    fn write_err(path: &Path, source: std::io::Error) -> AggregationError {
        AggregationError::WriteError {
            path: path.to_path_buf(),
            source,
        }
    }

    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|source| write_err(destination, source))?;

    let mut temp = NamedTempFile::new_in(&parent).map_err(|source| write_err(destination, source))?;
    temp.write_all(bytes)
        .map_err(|source| write_err(destination, source))?;
    temp.flush().map_err(|source| write_err(destination, source))?;
    temp.persist(destination)
        .map_err(|persist| write_err(destination, persist.error))?;
    Ok(())
}
