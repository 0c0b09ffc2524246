use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;
use lotto_weather::{config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    logging::init(config.log_dir.as_deref(), config.log_retention_days)?;
    tracing::info!(db = %config.database_path.display(), "lotto-weather starting");

    cli.run(config).await.inspect_err(|e| {
        tracing::error!("run failed: {:?}", e);
    })
}
