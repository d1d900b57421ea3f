//! Table definitions for the three persisted entities.
//!
//! # Tables
//!
//! - `users` - Storefront and admin accounts (`username` unique)
//! - `products` - Catalogue; `specs` and `images` hold serialized JSON
//! - `orders` - Checkouts; `items` and `contact_info` hold serialized JSON
//!
//! Every dialect renders the same column names in the same order, so rows can
//! be copied 1:1 between the SQLite file and `PostgreSQL`.

use std::fmt::Write as _;

/// SQL dialect of a real backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Embedded SQLite file; `?` placeholders.
    Sqlite,
    /// Remote `PostgreSQL`; `$n` placeholders.
    Postgres,
}

/// Storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Auto-assigned integer primary key.
    Identity,
    Integer,
    Real,
    Text,
    Timestamp,
}

/// Column default applied when an insert omits the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    Text(&'static str),
    /// Creation time of the row.
    Now,
}

/// A single column of a [`TableDef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnDef {
    const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            unique: false,
            default: None,
        }
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    fn render(&self, dialect: Dialect) -> String {
        let ty = match (self.kind, dialect) {
            (ColumnKind::Identity, Dialect::Sqlite) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            (ColumnKind::Identity, Dialect::Postgres) => "SERIAL PRIMARY KEY",
            (ColumnKind::Integer, _) => "INTEGER",
            (ColumnKind::Real, _) => "REAL",
            (ColumnKind::Text, _) => "TEXT",
            (ColumnKind::Timestamp, Dialect::Sqlite) => "DATETIME",
            (ColumnKind::Timestamp, Dialect::Postgres) => "TIMESTAMPTZ",
        };

        let mut out = format!("{} {ty}", self.name);
        if self.unique {
            out.push_str(" UNIQUE");
        }
        match (self.default, dialect) {
            (Some(ColumnDefault::Text(text)), _) => {
                let _ = write!(out, " DEFAULT '{}'", text.replace('\'', "''"));
            }
            (Some(ColumnDefault::Now), Dialect::Sqlite) => out.push_str(" DEFAULT CURRENT_TIMESTAMP"),
            (Some(ColumnDefault::Now), Dialect::Postgres) => out.push_str(" DEFAULT NOW()"),
            (None, _) => {}
        }
        out
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// A table with no declared columns (e.g. created from unrecognized DDL).
    #[must_use]
    pub fn schemaless(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Render an idempotent `CREATE TABLE IF NOT EXISTS` statement.
    #[must_use]
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| c.render(dialect))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({columns})", self.name)
    }
}

/// The `users` table.
#[must_use]
pub fn users() -> TableDef {
    TableDef {
        name: "users".to_owned(),
        columns: vec![
            ColumnDef::new("id", ColumnKind::Identity),
            ColumnDef::new("username", ColumnKind::Text).unique(),
            ColumnDef::new("password", ColumnKind::Text),
            ColumnDef::new("role", ColumnKind::Text).default(ColumnDefault::Text("user")),
        ],
    }
}

/// The `products` table.
#[must_use]
pub fn products() -> TableDef {
    TableDef {
        name: "products".to_owned(),
        columns: vec![
            ColumnDef::new("id", ColumnKind::Identity),
            ColumnDef::new("name", ColumnKind::Text),
            ColumnDef::new("description", ColumnKind::Text),
            ColumnDef::new("price", ColumnKind::Real),
            ColumnDef::new("stock", ColumnKind::Integer),
            ColumnDef::new("category", ColumnKind::Text),
            ColumnDef::new("specs", ColumnKind::Text),
            ColumnDef::new("images", ColumnKind::Text),
            ColumnDef::new("model_url", ColumnKind::Text),
            ColumnDef::new("doc_url", ColumnKind::Text),
            ColumnDef::new("created_at", ColumnKind::Timestamp).default(ColumnDefault::Now),
        ],
    }
}

/// The `orders` table.
#[must_use]
pub fn orders() -> TableDef {
    TableDef {
        name: "orders".to_owned(),
        columns: vec![
            ColumnDef::new("id", ColumnKind::Identity),
            ColumnDef::new("user_id", ColumnKind::Integer),
            ColumnDef::new("items", ColumnKind::Text),
            ColumnDef::new("total_price", ColumnKind::Real),
            ColumnDef::new("status", ColumnKind::Text)
                .default(ColumnDefault::Text(profile_shop_core::DEFAULT_ORDER_STATUS)),
            ColumnDef::new("contact_info", ColumnKind::Text),
            ColumnDef::new("created_at", ColumnKind::Timestamp).default(ColumnDefault::Now),
        ],
    }
}

/// All tables, in creation order.
#[must_use]
pub fn all() -> Vec<TableDef> {
    vec![users(), products(), orders()]
}

/// Look up a known table definition by name.
#[must_use]
pub fn find(name: &str) -> Option<TableDef> {
    all().into_iter().find(|t| t.name == name)
}
