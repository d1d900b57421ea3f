//! The closed set of statement shapes the application issues.
//!
//! Call sites build a [`Statement`] directly; the in-memory emulator
//! dispatches on the variant and the SQL backends render it with
//! [`Statement::to_sql`]. [`Statement::parse`] recognizes the same shapes from
//! SQL text for callers that still hold literal queries.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::{self, Dialect, TableDef};

/// Row filter of a `SELECT * FROM <table>` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// No `WHERE` clause.
    All,
    /// `username = ? AND password = ?`; both must match exactly.
    Credentials,
    /// `id = ?`, matched with type-coercing equality.
    Id,
    /// `user_id = ?`, matched with type-coercing equality.
    UserId,
    /// `username = '<literal>'`.
    Username(String),
    /// A `WHERE` clause outside the recognized set.
    ///
    /// SQL backends evaluate it; the emulator ignores it and returns the
    /// whole table.
    Unrecognized(String),
}

impl Filter {
    /// Number of `?` parameters the filter consumes.
    #[must_use]
    pub fn param_count(&self) -> usize {
        match self {
            Self::All | Self::Username(_) => 0,
            Self::Id | Self::UserId => 1,
            Self::Credentials => 2,
            Self::Unrecognized(text) => count_placeholders(text),
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// `ORDER BY created_at DESC`.
    CreatedAtDesc,
}

/// A `SELECT * FROM` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl Select {
    /// Select every row of `table`.
    #[must_use]
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::All,
            order: None,
            limit: None,
        }
    }

    /// Restrict rows with `filter`.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Newest rows first.
    #[must_use]
    pub fn newest_first(mut self) -> Self {
        self.order = Some(Order::CreatedAtDesc);
        self
    }

    /// Return at most `limit` rows.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A statement in the application's closed statement surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `CREATE TABLE IF NOT EXISTS`.
    CreateTable(TableDef),
    /// `INSERT INTO <table> (<columns>) VALUES (?, ...)`.
    Insert { table: String, columns: Vec<String> },
    /// `SELECT * FROM <table> [WHERE ...] [ORDER BY created_at DESC] [LIMIT n]`.
    Select(Select),
    /// `UPDATE <table> SET <col>=?, ... WHERE id=?`.
    ///
    /// Parameters are the SET values in column order followed by the id.
    Update { table: String, columns: Vec<String> },
    /// `DELETE FROM <table> WHERE id = ?`.
    Delete { table: String },
    /// SQL outside the recognized shapes.
    ///
    /// SQL backends execute it verbatim; the emulator treats it as a no-op.
    Raw(String),
}

impl Statement {
    /// Build an insert statement.
    #[must_use]
    pub fn insert(table: impl Into<String>, columns: &[&str]) -> Self {
        Self::Insert {
            table: table.into(),
            columns: columns.iter().map(|&c| c.to_owned()).collect(),
        }
    }

    /// Build an update-by-id statement.
    #[must_use]
    pub fn update(table: impl Into<String>, columns: &[&str]) -> Self {
        Self::Update {
            table: table.into(),
            columns: columns.iter().map(|&c| c.to_owned()).collect(),
        }
    }

    /// Build a delete-by-id statement.
    #[must_use]
    pub fn delete(table: impl Into<String>) -> Self {
        Self::Delete {
            table: table.into(),
        }
    }

    /// Name of the table the statement targets, if it is a recognized shape.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateTable(def) => Some(&def.name),
            Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table } => Some(table),
            Self::Select(select) => Some(&select.table),
            Self::Raw(_) => None,
        }
    }

    /// Number of `?` parameters the statement consumes.
    #[must_use]
    pub fn param_count(&self) -> usize {
        match self {
            Self::CreateTable(_) => 0,
            Self::Insert { columns, .. } => columns.len(),
            Self::Select(select) => select.filter.param_count(),
            Self::Update { columns, .. } => columns.len() + 1,
            Self::Delete { .. } => 1,
            Self::Raw(sql) => count_placeholders(sql),
        }
    }

    /// Position of the parameter compared against an identity column, if any.
    #[must_use]
    pub fn identity_param(&self) -> Option<usize> {
        match self {
            Self::Select(Select {
                filter: Filter::Id | Filter::UserId,
                ..
            })
            | Self::Delete { .. } => Some(0),
            Self::Update { columns, .. } => Some(columns.len()),
            _ => None,
        }
    }

    /// Returns true if the statement can change persisted state.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::Select(_))
    }

    /// Render SQL for a real backend.
    ///
    /// `PostgreSQL` output uses numbered placeholders and returns the new
    /// identity from inserts.
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let sql = match self {
            Self::CreateTable(def) => def.create_sql(dialect),
            Self::Insert { table, columns } => {
                let placeholders = vec!["?"; columns.len()].join(", ");
                let mut sql = format!(
                    "INSERT INTO {table} ({}) VALUES ({placeholders})",
                    columns.join(", ")
                );
                if dialect == Dialect::Postgres {
                    sql.push_str(" RETURNING id");
                }
                sql
            }
            Self::Select(select) => {
                let mut sql = format!("SELECT * FROM {}", select.table);
                match &select.filter {
                    Filter::All => {}
                    Filter::Credentials => sql.push_str(" WHERE username = ? AND password = ?"),
                    Filter::Id => sql.push_str(" WHERE id = ?"),
                    Filter::UserId => sql.push_str(" WHERE user_id = ?"),
                    Filter::Username(name) => {
                        sql.push_str(&format!(" WHERE username = '{}'", name.replace('\'', "''")));
                    }
                    Filter::Unrecognized(clause) => {
                        sql.push_str(" WHERE ");
                        sql.push_str(clause);
                    }
                }
                if select.order == Some(Order::CreatedAtDesc) {
                    sql.push_str(" ORDER BY created_at DESC");
                }
                if let Some(limit) = select.limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                sql
            }
            Self::Update { table, columns } => {
                let set = columns
                    .iter()
                    .map(|c| format!("{c} = ?"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("UPDATE {table} SET {set} WHERE id = ?")
            }
            Self::Delete { table } => format!("DELETE FROM {table} WHERE id = ?"),
            Self::Raw(sql) => sql.clone(),
        };

        match dialect {
            Dialect::Sqlite => sql,
            Dialect::Postgres => number_placeholders(&sql),
        }
    }

    /// Recognize one of the application's statement shapes from SQL text.
    ///
    /// Keywords are case-insensitive and whitespace is normalized. Text that
    /// matches no shape becomes [`Statement::Raw`].
    #[must_use]
    pub fn parse(sql: &str) -> Self {
        let normalized = WHITESPACE.replace_all(sql.trim(), " ");
        let q = normalized.trim_end_matches(';').trim();

        if let Some(caps) = CREATE_TABLE.captures(q) {
            let name = &caps[1];
            let def = schema::find(name).unwrap_or_else(|| TableDef::schemaless(name));
            return Self::CreateTable(def);
        }

        // Only all-placeholder VALUES lists are recognized; literals stay raw.
        if let Some(caps) = INSERT.captures(q)
            && let Some(columns) = placeholder_columns(&caps[2], &caps[3])
        {
            return Self::Insert {
                table: caps[1].to_owned(),
                columns,
            };
        }

        if let Some(caps) = SELECT.captures(q) {
            return Self::Select(parse_select(&caps[1], caps.get(2).map_or("", |m| m.as_str())));
        }

        // Every assignment must be `column = ?`; `SET status = 'shipped'`
        // carries its value in the text and stays raw.
        if let Some(caps) = UPDATE.captures(q)
            && let Some(columns) = caps[2]
                .split(',')
                .map(|assignment| {
                    ASSIGNMENT
                        .captures(assignment.trim())
                        .map(|c| c[1].to_owned())
                })
                .collect::<Option<Vec<_>>>()
        {
            return Self::Update {
                table: caps[1].to_owned(),
                columns,
            };
        }

        if let Some(caps) = DELETE.captures(q) {
            return Self::Delete {
                table: caps[1].to_owned(),
            };
        }

        Self::Raw(sql.to_owned())
    }
}

impl From<Select> for Statement {
    fn from(select: Select) -> Self {
        Self::Select(select)
    }
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| build_regex(r"\s+"));
static CREATE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^CREATE TABLE IF NOT EXISTS (\w+)"));
static INSERT: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^INSERT INTO (\w+) ?\((.*?)\) ?VALUES ?\((.*?)\)$"));
static SELECT: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^SELECT \* FROM (\w+)(?: (.*))?$"));
static UPDATE: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^UPDATE (\w+) SET (.*?) WHERE id ?= ?\?$"));
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| build_regex(r"^(\w+) ?= ?\?$"));
static DELETE: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^DELETE FROM (\w+) WHERE id ?= ?\?$"));
static LIMIT: LazyLock<Regex> = LazyLock::new(|| build_regex(r"(?i)\bLIMIT (\d+)\s*$"));
static ORDER_CREATED_DESC: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)\s*\bORDER BY created_at DESC\b"));
static WHERE: LazyLock<Regex> = LazyLock::new(|| build_regex(r"(?i)^WHERE (.*)$"));
static CREDENTIALS: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^username ?= ?\? AND password ?= ?\?$"));
static ID_EQ: LazyLock<Regex> = LazyLock::new(|| build_regex(r"(?i)^id ?= ?\?$"));
static USER_ID_EQ: LazyLock<Regex> = LazyLock::new(|| build_regex(r"(?i)^user_id ?= ?\?$"));
static USERNAME_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^username ?= ?'((?:[^']|'')*)'$"));

#[allow(clippy::expect_used)]
fn build_regex(pattern: &str) -> Regex {
    // Patterns are compile-time constants covered by the tests below.
    Regex::new(pattern).expect("statement pattern must compile")
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_owned()).collect()
}

fn placeholder_columns(columns: &str, values: &str) -> Option<Vec<String>> {
    let columns = split_list(columns);
    let values = split_list(values);
    (columns.len() == values.len() && values.iter().all(|v| v == "?")).then_some(columns)
}

fn parse_select(table: &str, rest: &str) -> Select {
    let mut select = Select::all(table);
    let mut rest = rest.trim().to_owned();

    if let Some(caps) = LIMIT.captures(&rest) {
        select.limit = caps[1].parse().ok();
        if let Some(m) = caps.get(0) {
            rest.truncate(m.start());
        }
    }

    if ORDER_CREATED_DESC.is_match(&rest) {
        select.order = Some(Order::CreatedAtDesc);
        rest = ORDER_CREATED_DESC.replace(&rest, "").into_owned();
    }

    let rest = rest.trim();
    if let Some(caps) = WHERE.captures(rest) {
        let clause = caps[1].trim();
        select.filter = if CREDENTIALS.is_match(clause) {
            Filter::Credentials
        } else if ID_EQ.is_match(clause) {
            Filter::Id
        } else if USER_ID_EQ.is_match(clause) {
            Filter::UserId
        } else if let Some(lit) = USERNAME_LITERAL.captures(clause) {
            Filter::Username(lit[1].replace("''", "'"))
        } else {
            Filter::Unrecognized(clause.to_owned())
        };
    } else if !rest.is_empty() {
        select.filter = Filter::Unrecognized(rest.to_owned());
    }

    select
}

/// Count `?` placeholders outside single-quoted literals.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    let mut in_literal = false;
    sql.chars()
        .filter(|&c| {
            if c == '\'' {
                in_literal = !in_literal;
            }
            c == '?' && !in_literal
        })
        .count()
}

/// Rewrite positional `?` placeholders to `$1, $2, ...` in source order.
///
/// The Nth `?` becomes `$N` regardless of repetition; question marks inside
/// single-quoted literals are left alone.
#[must_use]
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut in_literal = false;
    let mut n = 0;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                out.push(c);
            }
            '?' if !in_literal => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_placeholders_in_order() {
        assert_eq!(
            number_placeholders("INSERT INTO users (username, password, role) VALUES (?, ?, ?)"),
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn test_number_placeholders_skips_literals() {
        assert_eq!(
            number_placeholders("SELECT * FROM t WHERE a = '?' AND b = ? AND c = ?"),
            "SELECT * FROM t WHERE a = '?' AND b = $1 AND c = $2"
        );
    }

    #[test]
    fn test_parse_create_known_table() {
        let stmt = Statement::parse(
            "\n  CREATE TABLE IF NOT EXISTS users (\n id INTEGER PRIMARY KEY AUTOINCREMENT\n )",
        );
        assert_eq!(stmt, Statement::CreateTable(schema::users()));

        let stmt = Statement::parse("create table if not exists carts (id INTEGER)");
        assert_eq!(stmt, Statement::CreateTable(TableDef::schemaless("carts")));
    }

    #[test]
    fn test_parse_insert() {
        let stmt = Statement::parse(
            "\n    INSERT INTO products (name, description, price)\n    VALUES (?, ?, ?)\n  ",
        );
        assert_eq!(
            stmt,
            Statement::insert("products", &["name", "description", "price"])
        );
        assert_eq!(stmt.param_count(), 3);
    }

    #[test]
    fn test_parse_select_filters() {
        let cases = [
            ("SELECT * FROM products", Select::all("products")),
            (
                "SELECT * FROM users WHERE username = ? AND password = ?",
                Select::all("users").filter(Filter::Credentials),
            ),
            (
                "SELECT * FROM products WHERE id = ?",
                Select::all("products").filter(Filter::Id),
            ),
            (
                "SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC",
                Select::all("orders").filter(Filter::UserId).newest_first(),
            ),
            (
                "SELECT * FROM users WHERE username = 'admin'",
                Select::all("users").filter(Filter::Username("admin".to_owned())),
            ),
            (
                "SELECT * FROM products LIMIT 1",
                Select::all("products").limit(1),
            ),
            (
                "SELECT * FROM orders ORDER BY created_at DESC",
                Select::all("orders").newest_first(),
            ),
            (
                "SELECT * FROM products WHERE stock > ?",
                Select::all("products").filter(Filter::Unrecognized("stock > ?".to_owned())),
            ),
        ];

        for (sql, expected) in cases {
            assert_eq!(Statement::parse(sql), Statement::Select(expected), "{sql}");
        }
    }

    #[test]
    fn test_parse_update_and_delete() {
        assert_eq!(
            Statement::parse("UPDATE products SET name=?, stock=?\n WHERE id=?"),
            Statement::update("products", &["name", "stock"])
        );
        assert_eq!(
            Statement::parse("DELETE FROM orders WHERE id = ?"),
            Statement::delete("orders")
        );
    }

    #[test]
    fn test_parse_literal_values_stay_raw() {
        let sql = "UPDATE orders SET status = 'shipped' WHERE id = ?";
        let stmt = Statement::parse(sql);
        assert_eq!(stmt, Statement::Raw(sql.to_owned()));
        assert_eq!(stmt.to_sql(Dialect::Sqlite), sql);

        let mixed = "UPDATE products SET stock = ?, category = 'rail' WHERE id = ?";
        assert_eq!(Statement::parse(mixed), Statement::Raw(mixed.to_owned()));

        let insert = "INSERT INTO users (username, password, role) VALUES (?, ?, 'admin')";
        assert_eq!(Statement::parse(insert), Statement::Raw(insert.to_owned()));
    }

    #[test]
    fn test_parse_unknown_is_raw() {
        let sql = "SELECT COUNT(*) FROM users";
        assert_eq!(Statement::parse(sql), Statement::Raw(sql.to_owned()));
        assert!(Statement::parse("VACUUM").is_write());
    }

    #[test]
    fn test_render_round_trips_through_parse() {
        let statements = [
            Statement::insert("users", &["username", "password", "role"]),
            Select::all("orders").filter(Filter::UserId).newest_first().into(),
            Select::all("users")
                .filter(Filter::Username("o'brien".to_owned()))
                .into(),
            Statement::update("products", &["stock"]),
            Statement::delete("products"),
        ];
        for stmt in statements {
            assert_eq!(Statement::parse(&stmt.to_sql(Dialect::Sqlite)), stmt);
        }
    }

    #[test]
    fn test_render_postgres() {
        let stmt = Statement::insert("users", &["username", "password", "role"]);
        assert_eq!(
            stmt.to_sql(Dialect::Postgres),
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id"
        );

        let stmt = Statement::update("products", &["stock"]);
        assert_eq!(
            stmt.to_sql(Dialect::Postgres),
            "UPDATE products SET stock = $1 WHERE id = $2"
        );
    }

    #[test]
    fn test_identity_param_positions() {
        assert_eq!(Statement::delete("orders").identity_param(), Some(0));
        assert_eq!(
            Statement::update("products", &["name", "stock"]).identity_param(),
            Some(2)
        );
        assert_eq!(
            Statement::from(Select::all("orders").filter(Filter::UserId)).identity_param(),
            Some(0)
        );
        assert_eq!(Statement::from(Select::all("orders")).identity_param(), None);
    }
}
