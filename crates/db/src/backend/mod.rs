//! Storage backends and the uniform facade over them.
//!
//! # Backends
//!
//! - [`MemoryBackend`] - In-process emulator of the statement set
//! - [`SqliteBackend`] - Embedded SQLite file (feature `sqlite`)
//! - [`PostgresBackend`] - Remote `PostgreSQL` (feature `postgres`)
//!
//! Call sites only see [`Database`]: `query(stmt).get(params)`,
//! `query(stmt).all(params)` and `run(stmt, params)` behave the same whichever
//! backend was selected at startup.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::future::Future;

pub use memory::MemoryBackend;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use crate::bootstrap::{self, BootstrapReport};
use crate::config::{BackendChoice, DatabaseConfig, select_backend};
use crate::error::DbError;
use crate::statement::Statement;
use crate::value::{Row, RunResult, Value};

/// A store that can execute [`Statement`]s.
pub trait Backend: Send + Sync {
    /// Short name for logs and status output.
    fn name(&self) -> &'static str;

    /// Run a read statement and return every row.
    fn fetch_all(
        &self,
        stmt: &Statement,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<Row>, DbError>> + Send;

    /// Run a write statement.
    fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
    ) -> impl Future<Output = Result<RunResult, DbError>> + Send;
}

/// The active store, chosen once at startup.
///
/// Construct it with [`Database::open`] (or [`Database::connect`] to skip
/// bootstrapping) and hand it to request handlers, typically inside an
/// `Arc`.
#[derive(Debug)]
pub enum Database {
    /// In-memory emulator.
    Memory(MemoryBackend),
    /// Embedded SQLite file.
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteBackend),
    /// Remote `PostgreSQL`.
    #[cfg(feature = "postgres")]
    Postgres(PostgresBackend),
}

impl Database {
    /// An empty in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryBackend::new())
    }

    /// Instantiate the backend [`select_backend`] picks for `config`.
    ///
    /// An embedded file that cannot be opened at all falls back to the
    /// in-memory emulator.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Unavailable` if a remote store is configured but
    /// cannot be reached (or support for it was not compiled in).
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        match select_backend(config) {
            BackendChoice::Postgres(url) => {
                #[cfg(feature = "postgres")]
                {
                    tracing::info!("Using PostgreSQL database");
                    PostgresBackend::connect(&url, config.timeout)
                        .await
                        .map(Self::Postgres)
                }
                #[cfg(not(feature = "postgres"))]
                {
                    drop(url);
                    Err(DbError::Unavailable(
                        "a PostgreSQL URL is configured but PostgreSQL support is not compiled in".to_owned(),
                    ))
                }
            }
            BackendChoice::Sqlite(path) => {
                #[cfg(feature = "sqlite")]
                {
                    tracing::info!(path = %path.display(), "Using SQLite database");
                    match SqliteBackend::open(&path).await {
                        Ok(backend) => Ok(Self::Sqlite(backend)),
                        Err(err) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %err,
                                "SQLite unavailable, falling back to in-memory database"
                            );
                            Ok(Self::memory())
                        }
                    }
                }
                #[cfg(not(feature = "sqlite"))]
                {
                    drop(path);
                    Ok(Self::memory())
                }
            }
            BackendChoice::Memory => {
                tracing::info!("Using in-memory database");
                Ok(Self::memory())
            }
        }
    }

    /// Connect and bootstrap the schema; the single startup entry point.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if connecting or bootstrapping fails.
    pub async fn open(config: &DatabaseConfig) -> Result<(Self, BootstrapReport), DbError> {
        let db = Self::connect(config).await?;
        let report = bootstrap::run(&db).await?;
        Ok((db, report))
    }

    /// Name of the active backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(b) => b.name(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(b) => b.name(),
            #[cfg(feature = "postgres")]
            Self::Postgres(b) => b.name(),
        }
    }

    /// Prepare a read statement.
    #[must_use]
    pub const fn query<'a>(&'a self, stmt: &'a Statement) -> Cursor<'a> {
        Cursor { db: self, stmt }
    }

    /// Execute a write statement.
    ///
    /// A write rejected because the store is read-only yields
    /// [`RunResult::NONE`] and a warning instead of an error.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Conflict` on a unique violation,
    /// `DbError::ParameterMismatch` if `params` does not fit the statement,
    /// and any other backend failure.
    pub async fn run(&self, stmt: &Statement, params: &[Value]) -> Result<RunResult, DbError> {
        check_params(stmt, params)?;
        let result = match self {
            Self::Memory(b) => b.execute(stmt, params).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(b) => b.execute(stmt, params).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(b) => b.execute(stmt, params).await,
        };

        match result {
            Err(DbError::ReadOnly) => {
                tracing::warn!(
                    backend = self.backend_name(),
                    table = stmt.table().unwrap_or("?"),
                    "Write ignored: database is read-only"
                );
                Ok(RunResult::NONE)
            }
            other => other,
        }
    }

    async fn fetch_all(&self, stmt: &Statement, params: &[Value]) -> Result<Vec<Row>, DbError> {
        if !matches!(stmt, Statement::Select(_) | Statement::Raw(_)) {
            tracing::warn!(
                table = stmt.table().unwrap_or("?"),
                "Write statement passed to query(); returning no rows"
            );
            return Ok(Vec::new());
        }
        check_params(stmt, params)?;
        match self {
            Self::Memory(b) => b.fetch_all(stmt, params).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(b) => b.fetch_all(stmt, params).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(b) => b.fetch_all(stmt, params).await,
        }
    }
}

impl From<MemoryBackend> for Database {
    fn from(backend: MemoryBackend) -> Self {
        Self::Memory(backend)
    }
}

#[cfg(feature = "sqlite")]
impl From<SqliteBackend> for Database {
    fn from(backend: SqliteBackend) -> Self {
        Self::Sqlite(backend)
    }
}

#[cfg(feature = "postgres")]
impl From<PostgresBackend> for Database {
    fn from(backend: PostgresBackend) -> Self {
        Self::Postgres(backend)
    }
}

/// Parameter counts are checked for the recognized shapes only; raw SQL is
/// left to the engine.
fn check_params(stmt: &Statement, params: &[Value]) -> Result<(), DbError> {
    if matches!(stmt, Statement::Raw(_)) {
        return Ok(());
    }
    let expected = stmt.param_count();
    if params.len() == expected {
        Ok(())
    } else {
        Err(DbError::ParameterMismatch {
            expected,
            got: params.len(),
        })
    }
}

/// A read statement bound to a [`Database`], awaiting parameters.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    db: &'a Database,
    stmt: &'a Statement,
}

impl Cursor<'_> {
    /// The first matching row, if any.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the backend fails.
    pub async fn get(&self, params: &[Value]) -> Result<Option<Row>, DbError> {
        Ok(self.db.fetch_all(self.stmt, params).await?.into_iter().next())
    }

    /// Every matching row, in the backend's order.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the backend fails.
    pub async fn all(&self, params: &[Value]) -> Result<Vec<Row>, DbError> {
        self.db.fetch_all(self.stmt, params).await
    }
}
