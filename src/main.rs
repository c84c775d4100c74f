//! Raydium Sniper Bot - buys newly opened Raydium pools that pass risk checks
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Most freshly launched tokens go to zero (rug pulls, abandonment).
//! - Passing every filter does not make a token safe.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use raydium_sniper::cli::commands;
use raydium_sniper::config::Config;

/// Raydium Sniper Bot - new-pool sniper with automated exits
#[derive(Parser)]
#[command(name = "snipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sniper bot
    Start {
        /// Run in dry-run mode (evaluate pools, never trade)
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the risk filters against an existing pool
    Inspect {
        /// Raydium AMM v4 pool address
        pool: String,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check system health (RPC, WebSocket, wallet, price feed)
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("raydium_sniper=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    info!("Loaded configuration from {}", cli.config);

    let result = match cli.command {
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Inspect { pool } => commands::inspect(&config, &pool).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
