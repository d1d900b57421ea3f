//! Startup bootstrap command.

use profile_shop_db::{Database, DatabaseConfig};

/// Select a backend from the environment, create tables and seed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the backend fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_env()?;
    tracing::debug!(?config, "Loaded database configuration");

    let (db, report) = Database::open(&config).await?;

    tracing::info!(backend = db.backend_name(), "Bootstrap complete");
    if report.admin_seeded {
        tracing::info!("Seeded admin account");
    }
    if report.product_seeded {
        tracing::info!("Seeded initial product");
    }
    Ok(())
}
