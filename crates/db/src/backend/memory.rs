//! In-process statement emulator.
//!
//! Executes the closed [`Statement`] set against a map of table name to
//! ordered rows. It is not a SQL engine: filters outside the recognized set
//! are ignored (the whole table is returned) and [`Statement::Raw`] is a
//! no-op.
//!
//! The table map sits behind a mutex so each statement is atomic with respect
//! to concurrent handlers.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

use super::Backend;
use crate::error::DbError;
use crate::models::parse_timestamp;
use crate::schema::{ColumnDefault, ColumnKind, TableDef};
use crate::statement::{Filter, Order, Select, Statement};
use crate::value::{Row, RunResult, Value};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

struct MemoryTable {
    /// Declared columns, when the table was created from a known definition.
    def: Option<TableDef>,
    rows: Vec<Row>,
    /// Last identity handed out; never decreases, even after deletes.
    last_id: i64,
}

impl MemoryTable {
    fn new(def: Option<TableDef>) -> Self {
        Self {
            def,
            rows: Vec::new(),
            last_id: 0,
        }
    }

    fn check_unique(&self, table: &str, row: &Row, skip_id: Option<&Value>) -> Result<(), DbError> {
        let Some(def) = &self.def else {
            return Ok(());
        };

        for column in def.columns.iter().filter(|c| c.unique) {
            let value = row.get(column.name);
            if value.is_null() {
                continue;
            }
            let taken = self.rows.iter().any(|existing| {
                skip_id.is_none_or(|id| !existing.get("id").loose_eq(id))
                    && existing.get(column.name) == value
            });
            if taken {
                return Err(DbError::Conflict(format!(
                    "UNIQUE constraint failed: {table}.{}",
                    column.name
                )));
            }
        }
        Ok(())
    }
}

/// The in-memory emulator backend.
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, MemoryTable>>,
    clock: Clock,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock();
        let mut names: Vec<_> = tables.keys().cloned().collect();
        names.sort();
        f.debug_struct("MemoryBackend")
            .field("tables", &names)
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Create an empty store stamping rows with the system clock.
    #[must_use]
    pub fn new() -> Self {
        tracing::info!("Initializing in-memory database");
        Self::with_clock(Utc::now)
    }

    /// Create an empty store with a custom clock for `created_at` stamps.
    #[must_use]
    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            clock: Box::new(clock),
        }
    }

    /// Number of rows currently stored in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, |t| t.rows.len())
    }

    fn now(&self) -> Value {
        Value::Text((self.clock)().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Execute a select.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ParameterMismatch` if a filter parameter is missing.
    pub fn select(&self, select: &Select, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let tables = self.tables.lock();
        let Some(table) = tables.get(&select.table) else {
            return Ok(Vec::new());
        };

        let param = |i: usize| {
            params.get(i).ok_or(DbError::ParameterMismatch {
                expected: select.filter.param_count(),
                got: params.len(),
            })
        };

        let mut rows: Vec<Row> = match &select.filter {
            Filter::All => table.rows.clone(),
            Filter::Credentials => {
                let (username, password) = (param(0)?, param(1)?);
                table
                    .rows
                    .iter()
                    .filter(|r| r.get("username") == username && r.get("password") == password)
                    .cloned()
                    .collect()
            }
            Filter::Id => {
                let id = param(0)?;
                table
                    .rows
                    .iter()
                    .filter(|r| r.get("id").loose_eq(id))
                    .cloned()
                    .collect()
            }
            Filter::UserId => {
                let user_id = param(0)?;
                table
                    .rows
                    .iter()
                    .filter(|r| r.get("user_id").loose_eq(user_id))
                    .cloned()
                    .collect()
            }
            Filter::Username(name) => table
                .rows
                .iter()
                .filter(|r| r.text("username") == Some(name.as_str()))
                .cloned()
                .collect(),
            Filter::Unrecognized(clause) => {
                tracing::warn!(
                    table = %select.table,
                    clause = %clause,
                    "Unrecognized WHERE clause ignored by in-memory database; returning all rows"
                );
                table.rows.clone()
            }
        };
        drop(tables);

        if select.order == Some(Order::CreatedAtDesc) {
            // Stable sort: rows with equal timestamps keep insertion order.
            rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
        }
        if let Some(limit) = select.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }

    /// Execute a write statement.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Conflict` when an insert or update would duplicate a
    /// unique column, and `DbError::ParameterMismatch` when the parameters do
    /// not line up with the statement.
    pub fn write(&self, stmt: &Statement, params: &[Value]) -> Result<RunResult, DbError> {
        match stmt {
            Statement::CreateTable(def) => {
                let declared = (!def.columns.is_empty()).then(|| def.clone());
                self.tables
                    .lock()
                    .entry(def.name.clone())
                    .or_insert_with(|| MemoryTable::new(declared));
                Ok(RunResult::NONE)
            }
            Statement::Insert { table, columns } => self.insert(table, columns, params),
            Statement::Update { table, columns } => self.update(table, columns, params),
            Statement::Delete { table } => {
                let id = params.first().ok_or(DbError::ParameterMismatch {
                    expected: 1,
                    got: 0,
                })?;
                let mut tables = self.tables.lock();
                let Some(table) = tables.get_mut(table) else {
                    return Ok(RunResult::NONE);
                };
                match table.rows.iter().position(|r| r.get("id").loose_eq(id)) {
                    Some(idx) => {
                        table.rows.remove(idx);
                        Ok(RunResult::changed(1))
                    }
                    None => Ok(RunResult::NONE),
                }
            }
            Statement::Select(_) => Ok(RunResult::NONE),
            Statement::Raw(sql) => {
                tracing::warn!(sql = %sql, "Unrecognized statement ignored by in-memory database");
                Ok(RunResult::NONE)
            }
        }
    }

    fn insert(&self, table_name: &str, columns: &[String], params: &[Value]) -> Result<RunResult, DbError> {
        if params.len() != columns.len() {
            return Err(DbError::ParameterMismatch {
                expected: columns.len(),
                got: params.len(),
            });
        }

        let now = self.now();
        let mut tables = self.tables.lock();
        let table = tables
            .entry(table_name.to_owned())
            .or_insert_with(|| MemoryTable::new(None));

        let id = table.last_id + 1;
        let provided = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .and_then(|i| params.get(i))
                .cloned()
        };

        let mut row = Row::default();
        if let Some(def) = &table.def {
            for column in &def.columns {
                let value = match (column.kind, provided(column.name), column.default) {
                    (ColumnKind::Identity, _, _) => Value::Integer(id),
                    (_, Some(value), _) => value,
                    (_, None, Some(ColumnDefault::Text(text))) => Value::from(text),
                    (_, None, Some(ColumnDefault::Now)) => now.clone(),
                    (_, None, None) => Value::Null,
                };
                row.set(column.name, value);
            }
            for (column, value) in columns.iter().zip(params) {
                if !row.contains(column) {
                    row.set(column, value.clone());
                }
            }
        } else {
            for (column, value) in columns.iter().zip(params) {
                row.set(column, value.clone());
            }
            row.set("id", Value::Integer(id));
            row.set("created_at", now);
        }

        table.check_unique(table_name, &row, None)?;
        table.last_id = id;
        table.rows.push(row);
        Ok(RunResult::inserted(id))
    }

    fn update(&self, table_name: &str, columns: &[String], params: &[Value]) -> Result<RunResult, DbError> {
        if params.len() != columns.len() + 1 {
            return Err(DbError::ParameterMismatch {
                expected: columns.len() + 1,
                got: params.len(),
            });
        }
        let Some((id, values)) = params.split_last() else {
            return Ok(RunResult::NONE);
        };

        let mut tables = self.tables.lock();
        let Some(table) = tables.get_mut(table_name) else {
            return Ok(RunResult::NONE);
        };
        let Some(idx) = table.rows.iter().position(|r| r.get("id").loose_eq(id)) else {
            return Ok(RunResult::NONE);
        };

        let mut updated = table.rows.get(idx).cloned().unwrap_or_default();
        for (column, value) in columns.iter().zip(values) {
            updated.set(column, value.clone());
        }
        table.check_unique(table_name, &updated, Some(id))?;
        if let Some(slot) = table.rows.get_mut(idx) {
            *slot = updated;
        }
        Ok(RunResult::changed(1))
    }
}

/// A row's `created_at` for ordering; unparsable stamps sort oldest.
fn created_at(row: &Row) -> Option<DateTime<Utc>> {
    row.text("created_at").and_then(parse_timestamp)
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_all(&self, stmt: &Statement, params: &[Value]) -> Result<Vec<Row>, DbError> {
        match stmt {
            Statement::Select(select) => self.select(select, params),
            Statement::Raw(sql) => {
                tracing::warn!(sql = %sql, "Unrecognized query ignored by in-memory database");
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn execute(&self, stmt: &Statement, params: &[Value]) -> Result<RunResult, DbError> {
        self.write(stmt, params)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::params;
    use crate::schema;

    fn store() -> MemoryBackend {
        let db = MemoryBackend::new();
        for def in schema::all() {
            db.write(&Statement::CreateTable(def), &[]).unwrap();
        }
        db
    }

    fn insert_user(db: &MemoryBackend, username: &str) -> Result<RunResult, DbError> {
        db.write(
            &Statement::insert("users", &["username", "password", "role"]),
            &params![username, "pw", "user"],
        )
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let db = store();
        insert_user(&db, "alice").unwrap();
        db.write(&Statement::CreateTable(schema::users()), &[]).unwrap();
        assert_eq!(db.row_count("users"), 1);
    }

    #[test]
    fn test_insert_applies_schema_order_and_defaults() {
        let db = store();
        let result = db
            .write(
                &Statement::insert("users", &["username", "password"]),
                &params!["bob", "secret"],
            )
            .unwrap();
        assert_eq!(result, RunResult::inserted(1));

        let row = db
            .select(&Select::all("users").filter(Filter::Id), &params![1_i64])
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(
            row.column_names().collect::<Vec<_>>(),
            ["id", "username", "password", "role"]
        );
        assert_eq!(row.text("role"), Some("user"));
    }

    #[test]
    fn test_schemaless_table_gets_id_and_timestamp() {
        let db = MemoryBackend::new();
        let result = db
            .write(&Statement::insert("notes", &["body"]), &params!["hi"])
            .unwrap();
        assert_eq!(result.inserted_id, 1);
        let rows = db.select(&Select::all("notes"), &[]).unwrap();
        assert_eq!(
            rows[0].column_names().collect::<Vec<_>>(),
            ["body", "id", "created_at"]
        );
    }

    #[test]
    fn test_identity_never_reused_after_delete() {
        let db = store();
        for name in ["a", "b", "c"] {
            insert_user(&db, name).unwrap();
        }
        let deleted = db.write(&Statement::delete("users"), &params![1_i64]).unwrap();
        assert_eq!(deleted.affected, 1);

        let next = insert_user(&db, "d").unwrap();
        assert_eq!(next.inserted_id, 4);

        let live: Vec<i64> = db
            .select(&Select::all("users"), &[])
            .unwrap()
            .iter()
            .filter_map(|r| r.integer("id"))
            .collect();
        assert_eq!(live, [2, 3, 4]);
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let db = store();
        insert_user(&db, "alice").unwrap();
        let err = insert_user(&db, "alice").unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(db.row_count("users"), 1);

        // A failed insert does not consume an identity.
        assert_eq!(insert_user(&db, "bob").unwrap().inserted_id, 2);
    }

    #[test]
    fn test_credentials_filter_is_strict() {
        let db = store();
        insert_user(&db, "alice").unwrap();
        let select = Select::all("users").filter(Filter::Credentials);

        assert_eq!(db.select(&select, &params!["alice", "pw"]).unwrap().len(), 1);
        assert!(db.select(&select, &params!["alice", "nope"]).unwrap().is_empty());
        assert!(
            db.select(&select, &params!["alice"]).is_err(),
            "missing password parameter"
        );
    }

    #[test]
    fn test_id_filters_coerce_text() {
        let db = store();
        db.write(
            &Statement::insert("orders", &["user_id", "items", "total_price", "status", "contact_info"]),
            &params![7_i64, "[]", 0.0, "pending", "{}"],
        )
        .unwrap();

        let by_user = Select::all("orders").filter(Filter::UserId);
        assert_eq!(db.select(&by_user, &params!["7"]).unwrap().len(), 1);
        let by_id = Select::all("orders").filter(Filter::Id);
        assert_eq!(db.select(&by_id, &params!["1"]).unwrap().len(), 1);
        assert!(db.select(&by_id, &params!["7"]).unwrap().is_empty());
    }

    #[test]
    fn test_unrecognized_filter_returns_whole_table() {
        let db = store();
        insert_user(&db, "a").unwrap();
        insert_user(&db, "b").unwrap();
        let select = Select::all("users").filter(Filter::Unrecognized("role = ?".to_owned()));
        assert_eq!(db.select(&select, &params!["admin"]).unwrap().len(), 2);
    }

    #[test]
    fn test_newest_first_with_ties_keeps_insertion_order() {
        let fixed = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let db = MemoryBackend::with_clock(move || fixed);
        db.write(&Statement::CreateTable(schema::orders()), &[]).unwrap();
        for user in 1..=3_i64 {
            db.write(
                &Statement::insert("orders", &["user_id"]),
                &params![user],
            )
            .unwrap();
        }
        let rows = db
            .select(&Select::all("orders").newest_first(), &[])
            .unwrap();
        let ids: Vec<i64> = rows.iter().filter_map(|r| r.integer("id")).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn test_newest_first_orders_by_timestamp() {
        let ticks = std::sync::atomic::AtomicI64::new(0);
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let db = MemoryBackend::with_clock(move || {
            base + chrono::Duration::seconds(ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
        });
        db.write(&Statement::CreateTable(schema::orders()), &[]).unwrap();
        for user in 1..=3_i64 {
            db.write(&Statement::insert("orders", &["user_id"]), &params![user])
                .unwrap();
        }
        let rows = db
            .select(&Select::all("orders").newest_first().limit(2), &[])
            .unwrap();
        let ids: Vec<i64> = rows.iter().filter_map(|r| r.integer("id")).collect();
        assert_eq!(ids, [3, 2]);
    }

    #[test]
    fn test_update_assigns_positionally_and_checks_count() {
        let db = store();
        insert_user(&db, "alice").unwrap();

        let stmt = Statement::update("users", &["role"]);
        let result = db.write(&stmt, &params!["admin", "1"]).unwrap();
        assert_eq!(result.affected, 1);
        let row = db
            .select(&Select::all("users").filter(Filter::Id), &params![1_i64])
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(row.text("role"), Some("admin"));
        assert_eq!(row.text("username"), Some("alice"));

        let err = db.write(&stmt, &params!["admin"]).unwrap_err();
        assert!(matches!(
            err,
            DbError::ParameterMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_update_and_delete_missing_row_have_no_effect() {
        let db = store();
        let result = db
            .write(&Statement::update("users", &["role"]), &params!["admin", 99_i64])
            .unwrap();
        assert_eq!(result, RunResult::NONE);
        let result = db.write(&Statement::delete("users"), &params![99_i64]).unwrap();
        assert_eq!(result, RunResult::NONE);
        let result = db.write(&Statement::delete("carts"), &params![1_i64]).unwrap();
        assert_eq!(result, RunResult::NONE);
    }

    #[test]
    fn test_raw_statement_is_zero_effect() {
        let db = store();
        let result = db
            .write(&Statement::Raw("DROP TABLE users".to_owned()), &[])
            .unwrap();
        assert_eq!(result, RunResult::NONE);
        assert!(db.tables.lock().contains_key("users"));
    }
}
