//! Profile Shop CLI - Database bootstrap, status and migration tools.
//!
//! # Usage
//!
//! ```bash
//! # Create tables and seed the admin account and first product
//! shop-cli bootstrap
//!
//! # Show the selected backend and row counts
//! shop-cli status
//!
//! # Copy the embedded SQLite file into PostgreSQL (SHOP_DATABASE_URL)
//! shop-cli migrate --sqlite-path ./shop.sqlite --reset
//! ```
//!
//! # Commands
//!
//! - `bootstrap` - Select a backend from the environment and bootstrap it
//! - `status` - Bootstrap, then print row counts per table
//! - `migrate` - Copy SQLite data into `PostgreSQL`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "shop-cli")]
#[command(author, version, about = "Profile Shop CLI tools")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and seed initial rows
    Bootstrap,
    /// Show the active backend and row counts
    Status,
    /// Copy an embedded SQLite database into PostgreSQL
    Migrate {
        /// SQLite file to read (default: `SHOP_SQLITE_PATH` or shop.sqlite)
        #[arg(long)]
        sqlite_path: Option<PathBuf>,

        /// Truncate target tables first (also `SHOP_RESET_EXISTING=1`)
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "profile_shop_db=info,profile_shop_cli=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if cli.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Bootstrap => commands::bootstrap::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Migrate { sqlite_path, reset } => {
            commands::migrate::run(sqlite_path, reset).await?;
        }
    }
    Ok(())
}
