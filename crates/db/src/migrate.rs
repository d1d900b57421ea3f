//! One-shot copy of an embedded SQLite store into `PostgreSQL`.
//!
//! Rows keep their ids and creation times. Existing target rows with the same
//! id are overwritten, so the copy can be re-run; afterwards each serial
//! sequence is moved past the highest copied id.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use thiserror::Error;

use crate::backend::postgres::{PostgresBackend, bind_value};
use crate::backend::{Backend, SqliteBackend};
use crate::error::DbError;
use crate::models::parse_timestamp;
use crate::schema::{self, ColumnKind, Dialect, TableDef};
use crate::statement::Select;
use crate::value::{Row, Value};

/// Errors that can occur during a migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The source file does not exist.
    #[error("SQLite file not found at: {0}")]
    SourceMissing(PathBuf),

    /// A stored timestamp could not be parsed.
    #[error("invalid {column} in {table} row {id}: {value}")]
    InvalidTimestamp {
        table: String,
        column: String,
        id: i64,
        value: String,
    },

    /// Error reading the source store.
    #[error(transparent)]
    Source(#[from] DbError),

    /// Error writing the target store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Rows copied per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub users: usize,
    pub products: usize,
    pub orders: usize,
}

/// Copy every user, product and order from the SQLite file at `source` into
/// `target`.
///
/// With `reset`, the target tables are truncated (identities restarted)
/// first. The copy itself runs in one transaction and is rolled back on any
/// error.
///
/// # Errors
///
/// Returns `MigrationError::SourceMissing` if `source` does not exist, and
/// other variants if reading or writing fails.
pub async fn sqlite_to_postgres(
    source: &Path,
    target: &PostgresBackend,
    reset: bool,
) -> Result<MigrationReport, MigrationError> {
    if !source.exists() {
        return Err(MigrationError::SourceMissing(source.to_path_buf()));
    }
    tracing::info!(source = %source.display(), "Migrating SQLite database to PostgreSQL");

    let sqlite = SqliteBackend::open_read_only(source).await?;
    let users = read_table(&sqlite, "users").await?;
    let products = read_table(&sqlite, "products").await?;
    let orders = read_table(&sqlite, "orders").await?;
    sqlite.pool().close().await;

    let pool = target.pool();
    for table in schema::all() {
        sqlx::query(&table.create_sql(Dialect::Postgres))
            .execute(pool)
            .await?;
    }

    if reset {
        tracing::warn!("Truncating target tables before migration");
        sqlx::query("TRUNCATE TABLE orders, products, users RESTART IDENTITY CASCADE")
            .execute(pool)
            .await?;
    }

    let mut tx = pool.begin().await?;
    match copy_all(&mut tx, [&users[..], &products[..], &orders[..]]).await {
        Ok(()) => tx.commit().await?,
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::error!(error = %rollback, "Rollback failed");
            }
            tracing::error!(error = %err, "Migration failed, rolled back");
            return Err(err);
        }
    }

    let report = MigrationReport {
        users: users.len(),
        products: products.len(),
        orders: orders.len(),
    };
    tracing::info!(
        users = report.users,
        products = report.products,
        orders = report.orders,
        "Migration complete"
    );
    Ok(report)
}

async fn read_table(sqlite: &SqliteBackend, table: &str) -> Result<Vec<Row>, DbError> {
    sqlite.fetch_all(&Select::all(table).into(), &[]).await
}

async fn copy_all(
    tx: &mut Transaction<'static, Postgres>,
    tables: [&[Row]; 3],
) -> Result<(), MigrationError> {
    for (def, rows) in schema::all().iter().zip(tables) {
        copy_table(&mut **tx, def, rows).await?;
    }
    for def in schema::all() {
        sqlx::query(&sync_sequence_sql(&def.name))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn copy_table(conn: &mut PgConnection, def: &TableDef, rows: &[Row]) -> Result<(), MigrationError> {
    let sql = upsert_sql(def);
    for row in rows {
        let mut query = sqlx::query(&sql);
        for column in &def.columns {
            let value = row.get(column.name);
            query = if column.kind == ColumnKind::Timestamp {
                query.bind(timestamp(def, column.name, row, value)?)
            } else {
                bind_value(query, value)
            };
        }
        query.execute(&mut *conn).await?;
    }
    tracing::debug!(table = %def.name, rows = rows.len(), "Copied table");
    Ok(())
}

fn timestamp(def: &TableDef, column: &str, row: &Row, value: &Value) -> Result<Option<DateTime<Utc>>, MigrationError> {
    match value {
        Value::Null => Ok(None),
        Value::Text(text) => parse_timestamp(text).map(Some).ok_or_else(|| MigrationError::InvalidTimestamp {
            table: def.name.clone(),
            column: column.to_owned(),
            id: row.integer("id").unwrap_or_default(),
            value: text.clone(),
        }),
        other => Err(MigrationError::InvalidTimestamp {
            table: def.name.clone(),
            column: column.to_owned(),
            id: row.integer("id").unwrap_or_default(),
            value: format!("{other:?}"),
        }),
    }
}

/// `INSERT ... ON CONFLICT (id) DO UPDATE` over every column of `def`.
///
/// A missing creation time falls back to the column default.
fn upsert_sql(def: &TableDef) -> String {
    let names: Vec<&str> = def.columns.iter().map(|c| c.name).collect();
    let values: Vec<String> = def
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| match c.kind {
            ColumnKind::Timestamp => format!("COALESCE(${}, NOW())", i + 1),
            _ => format!("${}", i + 1),
        })
        .collect();
    let updates: Vec<String> = def
        .columns
        .iter()
        .filter(|c| c.kind != ColumnKind::Identity)
        .map(|c| format!("{0} = EXCLUDED.{0}", c.name))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (id) DO UPDATE SET {}",
        def.name,
        names.join(", "),
        values.join(", "),
        updates.join(", ")
    )
}

fn sync_sequence_sql(table: &str) -> String {
    format!("SELECT setval(pg_get_serial_sequence('{table}', 'id'), COALESCE(MAX(id), 1)) FROM {table}")
}
