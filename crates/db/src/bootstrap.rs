//! Idempotent schema creation and seeding.
//!
//! Runs once at startup against whichever backend was selected: creates the
//! three tables if missing, then seeds the `admin` account and a first
//! catalogue product when they are absent. Safe to run any number of times.

use profile_shop_core::Role;

use crate::backend::Database;
use crate::error::DbError;
use crate::params;
use crate::schema;
use crate::statement::{Filter, Select, Statement};

/// Username of the seeded administrator.
pub const ADMIN_USERNAME: &str = "admin";
/// Password of the seeded administrator.
pub const ADMIN_PASSWORD: &str = "admin123";

const SEED_PRODUCT_SKU: &str = "AH-GB01-4080D-L50-8";

/// What a bootstrap run inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// The admin account was inserted by this run.
    pub admin_seeded: bool,
    /// The first product was inserted by this run.
    pub product_seeded: bool,
}

/// Create tables and seed initial rows.
///
/// # Errors
///
/// Returns `DbError` if table creation or a lookup fails.
pub async fn run(db: &Database) -> Result<BootstrapReport, DbError> {
    for table in schema::all() {
        db.run(&Statement::CreateTable(table), &[]).await?;
    }

    let report = BootstrapReport {
        admin_seeded: seed_admin(db).await?,
        product_seeded: seed_product(db).await?,
    };

    tracing::info!(
        backend = db.backend_name(),
        admin_seeded = report.admin_seeded,
        product_seeded = report.product_seeded,
        "Database bootstrapped"
    );
    Ok(report)
}

async fn seed_admin(db: &Database) -> Result<bool, DbError> {
    let lookup: Statement = Select::all("users")
        .filter(Filter::Username(ADMIN_USERNAME.to_owned()))
        .into();
    if db.query(&lookup).get(&[]).await?.is_some() {
        return Ok(false);
    }

    let insert = Statement::insert("users", &["username", "password", "role"]);
    match db
        .run(&insert, &params![ADMIN_USERNAME, ADMIN_PASSWORD, Role::Admin.as_str()])
        .await
    {
        Ok(result) => Ok(result.affected > 0),
        // Another process seeded it between the lookup and the insert.
        Err(DbError::Conflict(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

async fn seed_product(db: &Database) -> Result<bool, DbError> {
    let lookup: Statement = Select::all("products").limit(1).into();
    if db.query(&lookup).get(&[]).await?.is_some() {
        return Ok(false);
    }

    let specs = serde_json::json!({
        "material": "Aluminium 6063-T5",
        "length": 6000,
        "weight": "3.5kg/m",
    });
    let images = serde_json::json!(["https://picsum.photos/600/600?random=1"]);

    let insert = Statement::insert(
        "products",
        &[
            "name",
            "description",
            "price",
            "stock",
            "category",
            "specs",
            "images",
            "model_url",
            "doc_url",
        ],
    );
    let result = db
        .run(
            &insert,
            &params![
                SEED_PRODUCT_SKU,
                "工业铝型材 4080D",
                88.0,
                100_i64,
                "profile",
                specs.to_string(),
                images.to_string(),
                format!("/{SEED_PRODUCT_SKU}.stl"),
                "/document.pdf",
            ],
        )
        .await?;
    Ok(result.affected > 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let db = Database::memory();
        let first = run(&db).await.unwrap();
        assert_eq!(
            first,
            BootstrapReport {
                admin_seeded: true,
                product_seeded: true
            }
        );

        let second = run(&db).await.unwrap();
        assert_eq!(second, BootstrapReport::default());

        let users: Statement = Select::all("users").into();
        let products: Statement = Select::all("products").into();
        assert_eq!(db.query(&users).all(&[]).await.unwrap().len(), 1);
        assert_eq!(db.query(&products).all(&[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_rows() {
        let db = Database::memory();
        run(&db).await.unwrap();

        let admin = db
            .query(&Select::all("users").filter(Filter::Credentials).into())
            .get(&params![ADMIN_USERNAME, ADMIN_PASSWORD])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.text("role"), Some("admin"));
        assert_eq!(admin.integer("id"), Some(1));

        let product = db
            .query(&Select::all("products").filter(Filter::Id).into())
            .get(&params![1_i64])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.text("name"), Some(SEED_PRODUCT_SKU));
        assert_eq!(product.real("price"), Some(88.0));
        assert_eq!(product.integer("stock"), Some(100));
        assert_eq!(product.text("model_url"), Some("/AH-GB01-4080D-L50-8.stl"));
        let specs: serde_json::Value =
            serde_json::from_str(product.text("specs").unwrap()).unwrap();
        assert_eq!(specs["length"], 6000);
    }

    #[tokio::test]
    async fn test_existing_catalogue_is_not_reseeded() {
        let db = Database::memory();
        db.run(&Statement::CreateTable(schema::products()), &[])
            .await
            .unwrap();
        db.run(
            &Statement::insert("products", &["name"]),
            &params!["Custom"],
        )
        .await
        .unwrap();

        let report = run(&db).await.unwrap();
        assert!(report.admin_seeded);
        assert!(!report.product_seeded);
    }
}
