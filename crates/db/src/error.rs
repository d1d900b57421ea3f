//! Error types for the persistence layer.

use thiserror::Error;

use crate::schema::Dialect;

/// Errors raised by a storage backend.
///
/// The facade absorbs [`DbError::ReadOnly`] into a zero-effect result; every
/// other variant reaches the caller.
#[derive(Debug, Error)]
pub enum DbError {
    /// No backend could be constructed, or a remote round trip timed out.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Constraint violation (e.g., duplicate username).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Write attempted against a store opened read-only.
    #[error("write attempted against a read-only store")]
    ReadOnly,

    /// The parameter list does not line up with the statement's placeholders.
    #[error("statement expects {expected} parameters, got {got}")]
    ParameterMismatch {
        /// Number of placeholders in the statement.
        expected: usize,
        /// Number of parameters supplied.
        got: usize,
    },

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DbError {
    /// Classify an sqlx error, singling out unique and read-only violations.
    #[cfg_attr(not(any(feature = "sqlite", feature = "postgres")), allow(dead_code))]
    pub(crate) fn from_sqlx(err: sqlx::Error, dialect: Dialect) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(db_err.message().to_owned());
            }
            if db_err.code().is_some_and(|code| is_read_only_code(&code, dialect)) {
                return Self::ReadOnly;
            }
        }
        Self::Database(err)
    }
}

/// Returns true for SQLite `SQLITE_READONLY*` codes and the `PostgreSQL`
/// `read_only_sql_transaction` SQLSTATE.
#[cfg_attr(not(any(feature = "sqlite", feature = "postgres")), allow(dead_code))]
fn is_read_only_code(code: &str, dialect: Dialect) -> bool {
    match dialect {
        Dialect::Postgres => code == "25006",
        // SQLite reports extended result codes; the primary code is the low byte.
        Dialect::Sqlite => code.parse::<i32>().is_ok_and(|c| c & 0xff == 8),
    }
}

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}
