use clap::Parser;
use license_manifest::{AggregatorConfig, CliArgs, LoggingConfig, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let cli = CliArgs::parse();
    let config = AggregatorConfig::from_args(cli)?;

    // Validate configuration before touching the filesystem (fail-fast)
    config.validate()?;

    license_manifest::run(config).await
}
