//! Typed repositories end to end on the emulator and a SQLite file.

#![allow(clippy::unwrap_used)]

use profile_shop_core::{ProductId, Role};
use profile_shop_db::models::ProductInput;
use profile_shop_db::{Database, ProductRepository, RepositoryError, UserRepository};
use profile_shop_integration_tests::{memory_db, sqlite_db};
use rust_decimal::Decimal;

fn extrusion(name: &str) -> ProductInput {
    ProductInput {
        name: name.to_owned(),
        description: Some("Slotted aluminium extrusion".to_owned()),
        price: Decimal::new(4250, 2),
        stock: 12,
        category: Some("profile".to_owned()),
        specs: serde_json::json!({"slot": 8, "length": 2000}),
        images: vec!["/a.jpg".to_owned(), "/b.jpg".to_owned()],
        model_url: None,
        doc_url: Some("/spec.pdf".to_owned()),
    }
}

async fn catalogue_lifecycle(db: &Database) {
    let repo = ProductRepository::new(db);
    let seeded = repo.list().await.unwrap().len();

    let id = repo.create(&extrusion("2040")).await.unwrap();
    let product = repo.get(id).await.unwrap().unwrap();
    assert_eq!(product.name, "2040");
    assert_eq!(product.price, Decimal::new(425, 1));
    assert_eq!(product.specs["slot"], 8);
    assert_eq!(product.images, ["/a.jpg", "/b.jpg"]);
    assert!(product.model_url.is_none());
    assert!(product.created_at.is_some());

    let mut changed = extrusion("2040 black");
    changed.stock = 3;
    repo.update(id, &changed).await.unwrap();
    repo.update_stock(id, 9).await.unwrap();
    let product = repo.get(id).await.unwrap().unwrap();
    assert_eq!(product.name, "2040 black");
    assert_eq!(product.stock, 9);

    let listed = repo.list().await.unwrap();
    assert_eq!(listed.len(), seeded + 1);
    // The catalogue lists in insertion order.
    assert_eq!(listed.last().map(|p| p.id), Some(id));
    assert_eq!(listed.iter().filter(|p| p.id == id).count(), 1);

    repo.delete(id).await.unwrap();
    assert!(repo.get(id).await.unwrap().is_none());
    assert!(matches!(repo.delete(id).await, Err(RepositoryError::NotFound)));
    assert!(matches!(
        repo.update_stock(ProductId::new(id.as_i64() + 1000), 1).await,
        Err(RepositoryError::NotFound)
    ));
}

async fn accounts(db: &Database) {
    let repo = UserRepository::new(db);
    let user = repo.create("alice", "s3cret").await.unwrap();
    assert_eq!(user.role, Role::User);

    let found = repo.find_by_credentials("alice", "s3cret").await.unwrap().unwrap();
    assert_eq!(found, user);
    assert!(repo.find_by_credentials("alice", "wrong").await.unwrap().is_none());
    assert_eq!(repo.find_by_username("alice").await.unwrap(), Some(user));
    assert!(matches!(
        repo.create("alice", "again").await,
        Err(RepositoryError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_memory_catalogue_lifecycle() {
    catalogue_lifecycle(&memory_db().await).await;
}

#[tokio::test]
async fn test_sqlite_catalogue_lifecycle() {
    let (_dir, db) = sqlite_db().await;
    catalogue_lifecycle(&db).await;
}

#[tokio::test]
async fn test_memory_accounts() {
    accounts(&memory_db().await).await;
}

#[tokio::test]
async fn test_sqlite_accounts() {
    let (_dir, db) = sqlite_db().await;
    accounts(&db).await;
}

#[tokio::test]
async fn test_sqlite_data_survives_reopen() {
    let (dir, db) = sqlite_db().await;
    let id = ProductRepository::new(&db)
        .create(&extrusion("persisted"))
        .await
        .unwrap();
    drop(db);

    let config = profile_shop_db::DatabaseConfig::sqlite(dir.path().join("shop.sqlite"));
    let (db, report) = Database::open(&config).await.unwrap();
    assert_eq!(report, profile_shop_db::BootstrapReport::default());
    let product = ProductRepository::new(&db).get(id).await.unwrap().unwrap();
    assert_eq!(product.name, "persisted");
}
