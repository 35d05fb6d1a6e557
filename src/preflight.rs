//! Tool version preflight.
//!
//! An optional pre-step the caller composes before `aggregate`: probe a
//! version-sensitive external tool, and if its reported version does not
//! match the pinned one, run the configured installer once and re-check.
//! Kept outside the aggregation pipeline so `aggregate` itself has no hidden
//! installation side effects.

use crate::aggregator::capture_output;
use crate::error::{AggregationError, AggregationResult, ToolFailureReason};
use crate::manifest::CommandSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Section label used in errors raised before any real section runs.
const PREFLIGHT_SECTION: &str = "tool preflight";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPreflight {
    /// Program to probe, e.g. `cargo`.
    pub program: String,
    /// Arguments that make the program print its version, e.g.
    /// `["about", "--version"]`.
    #[serde(default)]
    pub version_args: Vec<String>,
    /// Substring the version output must contain, e.g. `cargo-about 0.6.1`.
    pub expected: String,
    /// Installer to run once when the probe does not match. Without one, a
    /// mismatch is fatal.
    #[serde(default)]
    pub install: Option<CommandSpec>,
}

impl ToolPreflight {
    /// Probes the tool, installing and re-checking once on mismatch.
    pub async fn ensure(
        &self,
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> AggregationResult<()> {
        let Some(found) = self.check(working_dir, timeout).await? else {
            tracing::debug!(program = %self.program, expected = %self.expected, "tool version matches");
            return Ok(());
        };

        let Some(install) = &self.install else {
            return Err(self.mismatch(found));
        };

        tracing::warn!(
            program = %self.program,
            expected = %self.expected,
            found = %found,
            "tool version mismatch, running installer"
        );
        self.run_install(install, working_dir, timeout).await?;

        match self.check(working_dir, timeout).await? {
            None => Ok(()),
            Some(found) => Err(self.mismatch(found)),
        }
    }

    /// Returns `None` when the probe output contains the pinned version, and
    /// the version the tool actually reported otherwise. A probe that exits
    /// non-zero counts as a mismatch (the tool may simply not be installed
    /// yet), but a probe that cannot be launched at all is fatal.
    async fn check(
        &self,
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> AggregationResult<Option<String>> {
        let spec = CommandSpec {
            program: self.program.clone(),
            args: self.version_args.clone(),
            working_dir: None,
        };
        let output = capture_output(&spec, working_dir, timeout)
            .await
            .map_err(|reason| self.tool_failure(&self.program, reason))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && stdout.contains(&self.expected) {
            return Ok(None);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let found = stdout
            .lines()
            .chain(stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no version output")
            .to_string();
        Ok(Some(found))
    }

    async fn run_install(
        &self,
        install: &CommandSpec,
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> AggregationResult<()> {
        let dir = match &install.working_dir {
            Some(dir) => dir.clone(),
            None => working_dir.to_path_buf(),
        };
        let output = capture_output(install, &dir, timeout)
            .await
            .map_err(|reason| self.tool_failure(&install.program, reason))?;
        if !output.status.success() {
            return Err(self.tool_failure(
                &install.program,
                ToolFailureReason::NonZeroExit {
                    status: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                },
            ));
        }
        Ok(())
    }

    fn mismatch(&self, found: String) -> AggregationError {
        AggregationError::VersionMismatch {
            program: self.program.clone(),
            expected: self.expected.clone(),
            found,
        }
    }

    fn tool_failure(&self, program: &str, reason: ToolFailureReason) -> AggregationError {
        AggregationError::ExternalToolFailure {
            section: PREFLIGHT_SECTION.to_string(),
            program: program.to_string(),
            reason,
        }
    }
}
