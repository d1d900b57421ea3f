//! Profile Shop persistence layer.
//!
//! One facade, three interchangeable stores:
//! - a remote `PostgreSQL` database when a connection string is configured,
//! - otherwise an embedded SQLite file (reopened read-only if it cannot be
//!   written),
//! - otherwise an in-process emulator of the shop's statement set.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use profile_shop_db::{Database, DatabaseConfig, Filter, Select, params};
//!
//! let config = DatabaseConfig::from_env()?;
//! let (db, _report) = Database::open(&config).await?;
//!
//! let stmt = Select::all("products").filter(Filter::Id).into();
//! let product = db.query(&stmt).get(&params!["1"]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`backend`] - The [`Database`] facade and the three backends
//! - [`statement`] - The closed statement model
//! - [`schema`] - Table definitions
//! - [`bootstrap`] - Idempotent table creation and seeding
//! - [`repository`] - Typed access for request handlers
//! - [`migrate`] - SQLite to `PostgreSQL` copy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod error;
#[cfg(all(feature = "sqlite", feature = "postgres"))]
pub mod migrate;
pub mod models;
pub mod repository;
pub mod schema;
pub mod statement;
pub mod value;

pub use backend::{Backend, Cursor, Database, MemoryBackend};
pub use bootstrap::BootstrapReport;
pub use config::{BackendChoice, DatabaseConfig, select_backend};
pub use error::{ConfigError, DbError};
pub use repository::{OrderRepository, ProductRepository, RepositoryError, UserRepository};
pub use statement::{Filter, Order, Select, Statement};
pub use value::{Row, RunResult, Value};
