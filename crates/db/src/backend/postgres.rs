//! Remote `PostgreSQL` backend.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo, ValueRef};

use super::Backend;
use crate::error::DbError;
use crate::schema::Dialect;
use crate::statement::Statement;
use crate::value::{Row, RunResult, Value};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString, timeout: Duration) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(timeout)
        .connect(database_url.expose_secret())
        .await
}

/// A pooled connection to a remote `PostgreSQL` server.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresBackend {
    /// Connect to `database_url`; every round trip is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Unavailable` if the server cannot be reached.
    pub async fn connect(database_url: &SecretString, timeout: Duration) -> Result<Self, DbError> {
        let pool = create_pool(database_url, timeout)
            .await
            .map_err(|e| DbError::Unavailable(format!("cannot connect to PostgreSQL: {e}")))?;
        tracing::info!(?timeout, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool, timeout))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn timed<T>(&self, fut: impl Future<Output = Result<T, sqlx::Error>>) -> Result<T, DbError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DbError::Unavailable(format!("PostgreSQL round trip exceeded {:?}", self.timeout)))?
            .map_err(|e| DbError::from_sqlx(e, Dialect::Postgres))
    }
}

/// Coerce the identity parameter of `stmt` to an integer where possible.
///
/// `PostgreSQL` will not compare an integer column with text, while the other
/// backends accept `"5"` for id 5.
fn prepare_params(stmt: &Statement, params: &[Value]) -> Vec<Value> {
    let mut params = params.to_vec();
    if let Some(i) = stmt.identity_param()
        && let Some(param) = params.get_mut(i)
    {
        *param = std::mem::take(param).coerce_identity();
    }
    params
}

impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn fetch_all(&self, stmt: &Statement, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let sql = stmt.to_sql(Dialect::Postgres);
        let params = prepare_params(stmt, params);
        tracing::debug!(sql = %sql, "postgres query");
        let rows = self
            .timed(bind(sqlx::query(&sql), &params).fetch_all(&self.pool))
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, stmt: &Statement, params: &[Value]) -> Result<RunResult, DbError> {
        let sql = stmt.to_sql(Dialect::Postgres);
        let params = prepare_params(stmt, params);
        tracing::debug!(sql = %sql, "postgres execute");

        if let Statement::Insert { .. } = stmt {
            let row = self
                .timed(bind(sqlx::query(&sql), &params).fetch_one(&self.pool))
                .await?;
            let id = decode_row(&row)?.integer("id").unwrap_or_default();
            return Ok(RunResult::inserted(id));
        }

        let result = self
            .timed(bind(sqlx::query(&sql), &params).execute(&self.pool))
            .await?;
        Ok(RunResult::changed(result.rows_affected()))
    }
}

/// Bind positional parameters to a `PostgreSQL` query.
pub(crate) fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    params.iter().fold(query, |query, value| bind_value(query, value))
}

/// Bind one parameter. `NULL` is sent as a nullable `int8`, which assigns to
/// any numeric or text column.
pub(crate) fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Integer(v) => query.bind(*v),
        Value::Real(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
    }
}

/// Decode a row into raw values by column type.
///
/// Timestamps come back as RFC 3339 text so every backend hands out the same
/// representation.
pub(crate) fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    let mut columns = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match column.type_info().name() {
                "INT2" => Value::Integer(i64::from(row.try_get::<i16, _>(i)?)),
                "INT4" => Value::Integer(i64::from(row.try_get::<i32, _>(i)?)),
                "INT8" => Value::Integer(row.try_get::<i64, _>(i)?),
                "BOOL" => Value::Integer(i64::from(row.try_get::<bool, _>(i)?)),
                "FLOAT4" => Value::Real(f64::from(row.try_get::<f32, _>(i)?)),
                "FLOAT8" => Value::Real(row.try_get::<f64, _>(i)?),
                "NUMERIC" => {
                    let decimal = row.try_get::<Decimal, _>(i)?;
                    decimal
                        .to_f64()
                        .map_or_else(|| Value::Text(decimal.to_string()), Value::Real)
                }
                "TIMESTAMPTZ" => Value::Text(
                    row.try_get::<DateTime<Utc>, _>(i)?
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
                "TIMESTAMP" => Value::Text(
                    row.try_get::<NaiveDateTime, _>(i)?
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                ),
                _ => Value::Text(row.try_get::<String, _>(i)?),
            }
        };
        columns.push((column.name().to_owned(), value));
    }
    Ok(Row::new(columns))
}
