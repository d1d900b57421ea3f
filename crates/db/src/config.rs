//! Database configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `SHOP_DATABASE_URL` - `PostgreSQL` connection string; falls back to
//!   `POSTGRES_URL`, then `DATABASE_URL`. When set, the remote store is used.
//! - `SHOP_SQLITE_PATH` - Embedded database file (default: shop.sqlite)
//! - `SHOP_DB_TIMEOUT_SECS` - Remote round-trip timeout (default: 10)
//! - `SHOP_RESET_EXISTING` - `1`/`true` to truncate target tables before a
//!   migration (default: false)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

const DEFAULT_SQLITE_PATH: &str = "shop.sqlite";
const DEFAULT_TIMEOUT_SECS: &str = "10";
const DATABASE_URL_KEYS: &[&str] = &["SHOP_DATABASE_URL", "POSTGRES_URL", "DATABASE_URL"];

/// Persistence configuration.
///
/// Implements `Debug` manually to redact the connection string.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Remote `PostgreSQL` connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Embedded SQLite file path
    pub sqlite_path: PathBuf,
    /// Timeout for a single remote round trip
    pub timeout: Duration,
    /// Truncate target tables before migrating
    pub reset_existing: bool,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sqlite_path", &self.sqlite_path)
            .field("timeout", &self.timeout)
            .field("reset_existing", &self.reset_existing)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            timeout: Duration::from_secs(10),
            reset_existing: false,
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get_database_url(&lookup)?;
        let sqlite_path = PathBuf::from(get_env_or_default(&lookup, "SHOP_SQLITE_PATH", DEFAULT_SQLITE_PATH));
        let timeout_secs = get_env_or_default(&lookup, "SHOP_DB_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOP_DB_TIMEOUT_SECS".to_string(), e.to_string()))?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOP_DB_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let reset_existing = parse_flag(&lookup, "SHOP_RESET_EXISTING")?;

        Ok(Self {
            database_url,
            sqlite_path,
            timeout: Duration::from_secs(timeout_secs),
            reset_existing,
        })
    }

    /// Configuration for a specific SQLite file and nothing else.
    #[must_use]
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            sqlite_path: path.into(),
            ..Self::default()
        }
    }
}

/// Which backend the selector settled on.
#[derive(Debug, Clone)]
pub enum BackendChoice {
    /// Remote `PostgreSQL`.
    Postgres(SecretString),
    /// Embedded SQLite file.
    Sqlite(PathBuf),
    /// In-memory emulator.
    Memory,
}

/// Select a backend by fixed precedence.
///
/// A configured remote connection string wins; otherwise the embedded file
/// store is used when compiled in; otherwise the emulator.
#[must_use]
pub fn select_backend(config: &DatabaseConfig) -> BackendChoice {
    if let Some(url) = &config.database_url {
        return BackendChoice::Postgres(url.clone());
    }
    if cfg!(feature = "sqlite") {
        return BackendChoice::Sqlite(config.sqlite_path.clone());
    }
    BackendChoice::Memory
}

/// Get the database URL from the first key that is set, validating its scheme.
fn get_database_url(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<SecretString>, ConfigError> {
    let Some((key, value)) = DATABASE_URL_KEYS
        .iter()
        .find_map(|&key| lookup(key).filter(|v| !v.trim().is_empty()).map(|v| (key, v)))
    else {
        return Ok(None);
    };

    let secret = SecretString::from(value);
    let url = url::Url::parse(secret.expose_secret())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}' (expected postgres)", url.scheme()),
        ));
    }
    Ok(Some(secret))
}

/// Get an environment variable with a default value.
fn get_env_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool, ConfigError> {
    match lookup(key).as_deref().map(str::trim) {
        None | Some("" | "0" | "false") => Ok(false),
        Some("1" | "true") => Ok(true),
        Some(other) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected 1/true or 0/false, got '{other}'"),
        )),
    }
}
