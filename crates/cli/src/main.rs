use crate::{
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use connectors::source::{Driver, create_source};
use engine_config::job::JobConfig;
use engine_processing::schema::{SchemaProbe, index_mapping::build_index_mapping};
use engine_runtime::{execution::executor, planning::plan_ranges};
use serde_json::json;
use std::{path::Path, str::FromStr, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "databus", version = "0.1.0", about = "SQL to search index pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(err) if err.is_shutdown() || shutdown.is_shutdown_requested() => {
            warn!(error = %err, "Stopped before completion");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Run { config } => {
            let config = JobConfig::load(&config).await?;
            let summary = executor::run(config, shutdown.cancel_token()).await?;
            output::write_json(&summary, None).await?;
        }
        Commands::Probe { config, output } => {
            let config = JobConfig::load(&config).await?;
            probe(&config, output.as_deref()).await?;
        }
        Commands::Ranges { config } => {
            let config = JobConfig::load(&config).await?;
            for slice in plan_ranges(&config.ranges)? {
                println!("{}\t{}\t{}", slice.batch_number, slice.start, slice.end);
            }
            info!(data_sources = config.data_sources.len(), "Each slice is read once per data source");
        }
        Commands::TestConn { driver, url } => {
            let driver = Driver::from_str(&driver)?;
            let source = create_source(driver, &url, None);
            info!(source = %source.describe(), "Pinging");
            source.ping().await?;
            info!("Connection OK");
        }
    }

    Ok(())
}

async fn probe(config: &JobConfig, output: Option<&Path>) -> Result<(), CliError> {
    let timeout = (config.source.command_timeout_secs > 0)
        .then(|| Duration::from_secs(config.source.command_timeout_secs));
    let source = create_source(config.source.driver, &config.source.url, timeout);

    let key_column = &config.job.top_level_key_column;
    let items = SchemaProbe::new(source, key_column)
        .probe_all(&config.data_sources)
        .await?;
    let mapping = build_index_mapping(key_column, &items);

    if let Some(path) = &config.output.mapping_file {
        output::write_json(&mapping, Some(path.as_path())).await?;
        info!(path = %path.display(), "Wrote index mapping");
    }

    output::write_json(
        &json!({ "mapping_items": items, "index_mapping": mapping }),
        output,
    )
    .await
}
