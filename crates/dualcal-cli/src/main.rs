//! Dual-radio calibration CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dualcal_cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::execute_run(args).await?,
        Commands::InitConfig(args) => commands::execute_init_config(args).await?,
        Commands::InspectCache(args) => commands::execute_inspect_cache(args).await?,
        Commands::Watch(args) => commands::execute_watch(args).await?,
        Commands::Version => {
            println!("dualcal {}", env!("CARGO_PKG_VERSION"));
            println!("cache schema version: {}", dualcal_core::CACHE_SCHEMA_VERSION);
        }
    }

    Ok(())
}
