//! Backend status command.

use profile_shop_db::{Database, DatabaseConfig, Select, schema};

/// Print the active backend and the number of rows per table.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a query fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_env()?;
    let (db, _) = Database::open(&config).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("backend: {}", db.backend_name());
        for table in schema::all() {
            let rows = db.query(&Select::all(table.name.as_str()).into()).all(&[]).await?;
            println!("{:<10} {}", table.name, rows.len());
        }
    }
    Ok(())
}
