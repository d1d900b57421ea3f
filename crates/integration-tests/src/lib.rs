//! Integration tests for Profile Shop.
//!
//! # Running Tests
//!
//! ```bash
//! # Emulator and SQLite scenarios
//! cargo test -p profile-shop-integration-tests
//!
//! # Include the PostgreSQL scenarios
//! TEST_DATABASE_URL=postgres://localhost/profile_shop_test \
//!     cargo test -p profile-shop-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `facade` - Shared behaviour of every backend behind the facade
//! - `repositories` - Typed repositories end to end
//! - `postgres` - Remote store and the SQLite migration (ignored by default)

pub mod scenarios;

use std::time::Duration;

use profile_shop_db::backend::{PostgresBackend, SqliteBackend};
use profile_shop_db::{Database, bootstrap};
use secrecy::SecretString;
use tempfile::TempDir;

/// Environment variable holding the `PostgreSQL` test database URL.
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// A bootstrapped in-memory database.
///
/// # Panics
///
/// Panics if bootstrapping fails.
pub async fn memory_db() -> Database {
    let db = Database::memory();
    bootstrap::run(&db).await.expect("bootstrap in-memory database");
    db
}

/// A bootstrapped SQLite database in a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the database is used.
///
/// # Panics
///
/// Panics if the file cannot be created or bootstrapped.
pub async fn sqlite_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let backend = SqliteBackend::open(&dir.path().join("shop.sqlite"))
        .await
        .expect("open SQLite database");
    let db = Database::from(backend);
    bootstrap::run(&db).await.expect("bootstrap SQLite database");
    (dir, db)
}

/// The `PostgreSQL` test database URL, if configured.
#[must_use]
pub fn postgres_url() -> Option<SecretString> {
    std::env::var(TEST_DATABASE_URL).ok().map(SecretString::from)
}

/// A bootstrapped `PostgreSQL` database.
///
/// # Panics
///
/// Panics if `TEST_DATABASE_URL` is unset or the server is unreachable.
pub async fn postgres_db() -> Database {
    let url = postgres_url().expect("TEST_DATABASE_URL must be set");
    let backend = PostgresBackend::connect(&url, Duration::from_secs(10))
        .await
        .expect("connect to PostgreSQL");
    let db = Database::from(backend);
    bootstrap::run(&db).await.expect("bootstrap PostgreSQL database");
    db
}

/// A username no other test run will have used.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    format!("{prefix}-{nanos}")
}
