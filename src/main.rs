mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use gunsmith_advisor::config::load_config;
use gunsmith_advisor::util::logging::init_tracing;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    init_tracing(cli.log.as_deref().or(config.logging.filter.as_deref()));

    cli::run(cli, config).await
}
