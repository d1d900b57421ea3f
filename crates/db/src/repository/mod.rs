//! Typed repositories over the [`Database`](crate::Database) facade.
//!
//! # Repositories
//!
//! - [`UserRepository`] - Login lookup and registration
//! - [`ProductRepository`] - Catalogue CRUD and stock updates
//! - [`OrderRepository`] - Checkout and order listings
//!
//! Repositories only issue statement shapes every backend understands, so
//! they behave the same on the emulator, SQLite and `PostgreSQL`.

pub mod orders;
pub mod products;
pub mod users;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

use crate::error::DbError;
use crate::value::{Row, RunResult, Value};

/// Decimal places kept when reading a price stored as a float.
const MONEY_SCALE: u32 = 4;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Error from the storage backend.
    #[error("database error: {0}")]
    Database(DbError),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<DbError> for RepositoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Database(other),
        }
    }
}

/// An insert that reported no effect means the store refused the write.
fn ensure_written(result: RunResult) -> Result<RunResult, RepositoryError> {
    if result.affected == 0 {
        return Err(RepositoryError::Database(DbError::ReadOnly));
    }
    Ok(result)
}

fn required_text(row: &Row, column: &str) -> Result<String, RepositoryError> {
    row.text(column)
        .map(str::to_owned)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("missing {column}")))
}

fn optional_text(row: &Row, column: &str) -> Option<String> {
    row.text(column).map(str::to_owned)
}

fn required_id(row: &Row, column: &str) -> Result<i64, RepositoryError> {
    row.integer(column)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("invalid {column}: {:?}", row.get(column))))
}

/// Decode a JSON text column; `NULL` or empty text reads as `fallback`.
fn json_column<T: DeserializeOwned>(row: &Row, column: &str, fallback: &str) -> Result<T, RepositoryError> {
    let text = row.text(column).filter(|t| !t.is_empty()).unwrap_or(fallback);
    serde_json::from_str(text)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid JSON in {column}: {e}")))
}

fn decimal_column(row: &Row, column: &str) -> Result<Decimal, RepositoryError> {
    let invalid = || RepositoryError::DataCorruption(format!("invalid {column}: {:?}", row.get(column)));
    match row.get(column) {
        Value::Null => Ok(Decimal::ZERO),
        Value::Integer(v) => Ok(Decimal::from(*v)),
        Value::Real(v) => Decimal::from_f64(*v)
            .map(|d| d.round_dp(MONEY_SCALE).normalize())
            .ok_or_else(invalid),
        Value::Text(s) => s.trim().parse().map_err(|_| invalid()),
    }
}

fn json_text<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("cannot serialize: {e}")))
}
