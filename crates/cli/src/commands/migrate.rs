//! SQLite to `PostgreSQL` migration command.
//!
//! # Usage
//!
//! ```bash
//! SHOP_DATABASE_URL=postgres://... shop-cli migrate --sqlite-path ./shop.sqlite
//! ```
//!
//! # Environment Variables
//!
//! - `SHOP_DATABASE_URL` (or `POSTGRES_URL` / `DATABASE_URL`) - target database
//! - `SHOP_SQLITE_PATH` - source file when `--sqlite-path` is not given
//! - `SHOP_RESET_EXISTING` - `1` to truncate target tables first

use std::path::PathBuf;

use profile_shop_db::DatabaseConfig;
use profile_shop_db::backend::PostgresBackend;
use profile_shop_db::migrate::{MigrationError, sqlite_to_postgres};

/// Errors specific to the migrate command.
#[derive(Debug, thiserror::Error)]
pub enum MigrateCommandError {
    #[error("Missing environment variable: SHOP_DATABASE_URL (target database)")]
    MissingTarget,

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Copy the SQLite database into the configured `PostgreSQL` database.
///
/// # Errors
///
/// Returns an error if no target is configured or the migration fails.
pub async fn run(sqlite_path: Option<PathBuf>, reset: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_env()?;
    let url = config
        .database_url
        .as_ref()
        .ok_or(MigrateCommandError::MissingTarget)?;
    let source = sqlite_path.unwrap_or_else(|| config.sqlite_path.clone());

    tracing::info!(source = %source.display(), "Connecting to target database...");
    let target = PostgresBackend::connect(url, config.timeout).await?;

    let report = sqlite_to_postgres(&source, &target, reset || config.reset_existing)
        .await
        .map_err(MigrateCommandError::from)?;

    tracing::info!(
        users = report.users,
        products = report.products,
        orders = report.orders,
        "Migration complete!"
    );
    Ok(())
}
