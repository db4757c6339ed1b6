//! Market making quoter - entry point.
//!
//! `quoter-bot` runs the engine against the paper exchange until ctrl-c.
//! `quoter-bot account --user <addr>` prints an account's value and orders.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

/// Market making quoter
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via QUOTER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the quoter (default)
    Run,
    /// Show account value and resting orders
    Account {
        /// Account address
        #[arg(long)]
        user: String,
        /// Only show orders for this coin
        #[arg(long)]
        coin: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    quoter_telemetry::init_logging()?;

    info!("Starting quoter v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > QUOTER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("QUOTER_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = quoter_bot::AppConfig::from_file(&config_path)?;
    info!(?config.mode, info_url = %config.registry.info_url, "Configuration loaded");

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let app = quoter_bot::Application::new(config)?;
            app.run().await?;
        }
        Command::Account { user, coin } => {
            quoter_bot::app::show_account(&config, &user, coin.as_deref()).await?;
        }
    }

    Ok(())
}
