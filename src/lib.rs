pub mod aggregator;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod preflight;

pub use aggregator::aggregate;
pub use config::{AggregatorConfig, CliArgs};
pub use error::{AggregationError, AggregationResult, ToolFailureReason};
pub use logging::{LogFormat, LogOutput, LoggingConfig, init_logging};
pub use manifest::{
    CommandSpec, Section, SectionSource, SubstitutionRule, apply_substitutions,
    default_substitutions,
};
pub use preflight::ToolPreflight;

use anyhow::Result;

/// Runs the optional tool preflight followed by the aggregation pipeline.
pub async fn run(config: AggregatorConfig) -> Result<()> {
    tracing::info!(
        destination = %config.destination.display(),
        sections = config.sections.len(),
        "aggregating license manifest"
    );

    if let Some(preflight) = config.preflight.as_ref() {
        tracing::info!(
            program = %preflight.program,
            expected = %preflight.expected,
            "running tool preflight"
        );
        if let Err(error) = preflight
            .ensure(&config.working_dir, config.command_timeout)
            .await
        {
            tracing::error!(category = error.category(), %error, "preflight failed");
            return Err(error.into());
        }
    }

    if let Err(error) = aggregate(&config).await {
        tracing::error!(category = error.category(), %error, "aggregation failed");
        return Err(error.into());
    }
    Ok(())
}
