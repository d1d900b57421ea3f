//! Embedded SQLite file backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};

use super::Backend;
use crate::error::DbError;
use crate::schema::Dialect;
use crate::statement::Statement;
use crate::value::{Row, RunResult, Value};

const MAX_CONNECTIONS: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite file opened read-write, or read-only as a fallback.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    path: PathBuf,
    read_only: bool,
}

impl SqliteBackend {
    /// Open (creating if missing) the database file at `path`.
    ///
    /// If the file cannot be opened for writing, it is reopened read-only;
    /// writes against such a handle are rejected with [`DbError::ReadOnly`].
    ///
    /// # Errors
    ///
    /// Returns `DbError::Database` if neither mode can open the file.
    pub async fn open(path: &Path) -> Result<Self, DbError> {
        let writable = Self::connect(path, false).await;
        Self::or_read_only(path, writable).await
    }

    /// Keep a successful read-write open, otherwise retry `path` read-only.
    ///
    /// The engine itself downgrades a write-protected file to read-only
    /// without an error, so the retry only runs when the read-write open is
    /// refused outright (for example a file locked exclusively by another
    /// process).
    async fn or_read_only(path: &Path, writable: Result<Self, DbError>) -> Result<Self, DbError> {
        match writable {
            Ok(backend) => Ok(backend),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Could not open SQLite database for writing, retrying read-only"
                );
                Self::connect(path, true).await
            }
        }
    }

    /// Open an existing file read-only.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Database` if the file does not exist or cannot be read.
    pub async fn open_read_only(path: &Path) -> Result<Self, DbError> {
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, read_only: bool) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(!read_only)
            .read_only(read_only)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        // Connecting is lazy about the file itself; touch it now so a broken
        // path fails here rather than on the first statement.
        sqlx::query("SELECT 1").execute(&pool).await?;

        tracing::info!(path = %path.display(), read_only, "Opened SQLite database");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
            read_only,
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the file was opened read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_all(&self, stmt: &Statement, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let sql = stmt.to_sql(Dialect::Sqlite);
        tracing::debug!(sql = %sql, "sqlite query");
        let rows = bind(sqlx::query(&sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError::from_sqlx(e, Dialect::Sqlite))?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, stmt: &Statement, params: &[Value]) -> Result<RunResult, DbError> {
        if self.read_only {
            return Err(DbError::ReadOnly);
        }

        let sql = stmt.to_sql(Dialect::Sqlite);
        tracing::debug!(sql = %sql, "sqlite execute");
        let result = bind(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from_sqlx(e, Dialect::Sqlite))?;

        Ok(if is_insert(stmt) {
            RunResult {
                inserted_id: result.last_insert_rowid(),
                affected: result.rows_affected(),
            }
        } else {
            RunResult::changed(result.rows_affected())
        })
    }
}

fn is_insert(stmt: &Statement) -> bool {
    match stmt {
        Statement::Insert { .. } => true,
        Statement::Raw(sql) => sql
            .trim_start()
            .get(..6)
            .is_some_and(|keyword| keyword.eq_ignore_ascii_case("insert")),
        _ => false,
    }
}

/// Bind positional parameters to a SQLite query.
pub(crate) fn bind<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

/// Decode a row by each value's runtime storage class.
pub(crate) fn decode_row(row: &SqliteRow) -> Result<Row, DbError> {
    let mut columns = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" | "NUMERIC" => Value::Real(row.try_get_unchecked::<f64, _>(i)?),
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::Text(row.try_get_unchecked::<String, _>(i)?),
            }
        };
        columns.push((column.name().to_owned(), value));
    }
    Ok(Row::new(columns))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::params;
    use crate::schema;
    use crate::statement::{Filter, Select};

    async fn open_temp() -> (tempfile::TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(&dir.path().join("shop.sqlite")).await.unwrap();
        for def in schema::all() {
            backend.execute(&Statement::CreateTable(def), &[]).await.unwrap();
        }
        (dir, backend)
    }

    #[tokio::test]
    async fn test_insert_and_select_round_trip() {
        let (_dir, db) = open_temp().await;
        let result = db
            .execute(
                &Statement::insert("products", &["name", "price", "stock", "doc_url"]),
                &params!["Bracket", 12.5, 40_i64, None::<String>],
            )
            .await
            .unwrap();
        assert_eq!(result, RunResult::inserted(1));

        let rows = db
            .fetch_all(
                &Select::all("products").filter(Filter::Id).into(),
                &params!["1"],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.text("name"), Some("Bracket"));
        assert_eq!(row.get("price"), &Value::Real(12.5));
        assert_eq!(row.get("stock"), &Value::Integer(40));
        assert!(row.get("doc_url").is_null());
        assert!(row.text("created_at").is_some());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let (_dir, db) = open_temp().await;
        let insert = Statement::insert("users", &["username", "password"]);
        db.execute(&insert, &params!["alice", "pw"]).await.unwrap();
        let err = db.execute(&insert, &params!["alice", "pw"]).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_read_only_handle_rejects_writes() {
        let (dir, db) = open_temp().await;
        db.pool().close().await;

        let ro = SqliteBackend::open_read_only(&dir.path().join("shop.sqlite"))
            .await
            .unwrap();
        assert!(ro.is_read_only());
        let err = ro
            .execute(&Statement::insert("users", &["username"]), &params!["x"])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ReadOnly));
        assert!(ro.fetch_all(&Select::all("users").into(), &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_raw_insert_reports_identity() {
        let (_dir, db) = open_temp().await;
        let first = db
            .execute(
                &Statement::Raw("insert into users (username, password) values (?, ?)".to_owned()),
                &params!["raw", "pw"],
            )
            .await
            .unwrap();
        assert_eq!(first, RunResult::inserted(1));

        let second = db
            .execute(
                &Statement::Raw("  INSERT INTO users (username, password, role) VALUES (?, ?, 'admin')".to_owned()),
                &params!["raw2", "pw"],
            )
            .await
            .unwrap();
        assert_eq!(second, RunResult::inserted(2));

        let update = db
            .execute(
                &Statement::Raw("UPDATE users SET role = 'admin' WHERE id = ?".to_owned()),
                &params![1_i64],
            )
            .await
            .unwrap();
        assert_eq!(update, RunResult::changed(1));
    }

    #[tokio::test]
    async fn test_refused_write_open_retries_read_only() {
        let (dir, db) = open_temp().await;
        let path = dir.path().join("shop.sqlite");
        db.execute(
            &Statement::insert("users", &["username", "password"]),
            &params!["kept", "pw"],
        )
        .await
        .unwrap();
        db.pool().close().await;

        let refused = Err(DbError::Unavailable("database is locked".to_owned()));
        let ro = SqliteBackend::or_read_only(&path, refused).await.unwrap();
        assert!(ro.is_read_only());
        assert_eq!(ro.path(), path);

        let rows = ro.fetch_all(&Select::all("users").into(), &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        let err = ro
            .execute(&Statement::insert("users", &["username"]), &params!["x"])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ReadOnly));
    }

    #[tokio::test]
    async fn test_refused_write_open_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let refused = Err(DbError::Unavailable("cannot create".to_owned()));
        let result = SqliteBackend::or_read_only(&dir.path().join("missing.sqlite"), refused).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_successful_write_open_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.sqlite");
        let writable = SqliteBackend::connect(&path, false).await;
        let db = SqliteBackend::or_read_only(&path, writable).await.unwrap();
        assert!(!db.is_read_only());
    }

    #[tokio::test]
    async fn test_read_only_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            SqliteBackend::open_read_only(&dir.path().join("missing.sqlite"))
                .await
                .is_err()
        );
    }
}
