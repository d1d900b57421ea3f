//! Behaviour every backend must share, written once and run against each.
//!
//! Scenarios only compare ids relative to ones they created, so they also
//! hold on a long-lived `PostgreSQL` database.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use profile_shop_core::{ProductId, Role, UserId};
use profile_shop_db::bootstrap::{self, ADMIN_PASSWORD, ADMIN_USERNAME, BootstrapReport};
use profile_shop_db::models::{ContactInfo, NewOrder, OrderItem};
use profile_shop_db::{
    Database, DbError, Filter, OrderRepository, Select, Statement, UserRepository, Value, params,
};
use rust_decimal::Decimal;

use crate::unique_name;

async fn count(db: &Database, table: &str) -> usize {
    db.query(&Select::all(table).into()).all(&[]).await.unwrap().len()
}

async fn insert_user(db: &Database, username: &str) -> i64 {
    let stmt = Statement::insert("users", &["username", "password", "role"]);
    let result = db
        .run(&stmt, &params![username, "pw", Role::User.as_str()])
        .await
        .unwrap();
    assert_eq!(result.affected, 1);
    assert!(result.inserted_id > 0);
    result.inserted_id
}

async fn insert_product(db: &Database, name: &str, stock: i64) -> i64 {
    let stmt = Statement::parse(
        "INSERT INTO products (name, description, price, stock, category, specs, images, model_url, doc_url)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    );
    assert!(matches!(stmt, Statement::Insert { .. }));
    db.run(
        &stmt,
        &params![
            name,
            "Test profile",
            12.5,
            stock,
            "profile",
            r#"{"length":3000}"#,
            "[]",
            None::<String>,
            "/doc.pdf",
        ],
    )
    .await
    .unwrap()
    .inserted_id
}

async fn product(db: &Database, id: impl Into<Value>) -> Option<profile_shop_db::Row> {
    db.query(&Select::all("products").filter(Filter::Id).into())
        .get(&[id.into()])
        .await
        .unwrap()
}

/// Running the bootstrapper again adds nothing.
pub async fn bootstrap_is_idempotent(db: &Database) {
    let users = count(db, "users").await;
    let products = count(db, "products").await;

    let report = bootstrap::run(db).await.unwrap();
    assert_eq!(report, BootstrapReport::default());
    assert_eq!(count(db, "users").await, users);
    assert_eq!(count(db, "products").await, products);

    let admin = UserRepository::new(db)
        .find_by_credentials(ADMIN_USERNAME, ADMIN_PASSWORD)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin.role, Role::Admin);

    let by_literal = Statement::parse("SELECT * FROM users WHERE username = 'admin'");
    let row = db.query(&by_literal).get(&[]).await.unwrap().unwrap();
    assert_eq!(row.text("role"), Some("admin"));
}

/// Deleting the newest row never lets its identity be handed out again.
pub async fn identities_never_reused(db: &Database) {
    let a = insert_user(db, &unique_name("a")).await;
    let b = insert_user(db, &unique_name("b")).await;
    let c = insert_user(db, &unique_name("c")).await;
    assert!(a < b && b < c, "{a} < {b} < {c}");

    let deleted = db.run(&Statement::delete("users"), &params![c]).await.unwrap();
    assert_eq!(deleted.affected, 1);

    let d = insert_user(db, &unique_name("d")).await;
    assert!(d > c, "{d} > {c}");
}

/// A row reads back with the values it was written with.
pub async fn insert_round_trip(db: &Database) {
    let name = unique_name("round-trip");
    let id = insert_product(db, &name, 40).await;

    let row = product(db, id).await.unwrap();
    assert_eq!(row.integer("id"), Some(id));
    assert_eq!(row.text("name"), Some(name.as_str()));
    assert_eq!(row.real("price"), Some(12.5));
    assert_eq!(row.integer("stock"), Some(40));
    assert_eq!(row.text("specs"), Some(r#"{"length":3000}"#));
    assert!(row.get("model_url").is_null());
    assert_eq!(row.text("doc_url"), Some("/doc.pdf"));
}

/// An id given as text matches the stored integer identity.
pub async fn textual_id_matches_numeric(db: &Database) {
    let id = insert_product(db, &unique_name("textual"), 1).await;
    assert!(product(db, id.to_string()).await.is_some());

    let result = db
        .run(&Statement::parse("DELETE FROM products WHERE id = ?"), &params![id.to_string()])
        .await
        .unwrap();
    assert_eq!(result.affected, 1);
    assert!(product(db, id).await.is_none());
}

/// An update changes only the listed columns of the addressed row.
pub async fn update_touches_only_listed_columns(db: &Database) {
    let id = insert_product(db, &unique_name("update"), 100).await;
    let other = insert_product(db, &unique_name("bystander"), 100).await;
    let before = product(db, id).await.unwrap();

    let stmt = Statement::parse("UPDATE products SET stock = ? WHERE id = ?");
    let result = db.run(&stmt, &params![7_i64, id.to_string()]).await.unwrap();
    assert_eq!(result.affected, 1);

    let after = product(db, id).await.unwrap();
    assert_eq!(after.integer("stock"), Some(7));
    for column in ["name", "description", "price", "category", "specs", "images", "doc_url", "created_at"] {
        assert_eq!(after.get(column), before.get(column), "{column} changed");
    }
    assert_eq!(product(db, other).await.unwrap().integer("stock"), Some(100));

    let err = db.run(&stmt, &params![7_i64]).await.unwrap_err();
    assert!(matches!(err, DbError::ParameterMismatch { expected: 2, got: 1 }));
}

/// A duplicate unique value surfaces as a conflict, not a silent no-op.
pub async fn duplicate_username_is_conflict(db: &Database) {
    let name = unique_name("dup");
    insert_user(db, &name).await;

    let err = db
        .run(
            &Statement::insert("users", &["username", "password", "role"]),
            &params![name.as_str(), "other", "user"],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "{err:?}");

    let err = UserRepository::new(db).create(&name, "x").await.unwrap_err();
    assert!(matches!(err, profile_shop_db::RepositoryError::Conflict(_)));
}

/// Orders are found by buyer and carry their computed total.
pub async fn orders_by_user(db: &Database) {
    let buyer = UserId::new(insert_user(db, &unique_name("buyer")).await);
    let repo = OrderRepository::new(db);
    let order = NewOrder {
        user_id: Some(buyer),
        items: vec![
            OrderItem {
                product_id: ProductId::new(1),
                quantity: 2,
                price: Decimal::from(88),
            },
            OrderItem {
                product_id: ProductId::new(2),
                quantity: 1,
                price: Decimal::new(125, 1),
            },
        ],
        contact_info: ContactInfo {
            name: "Chen".to_owned(),
            phone: "139".to_owned(),
            address: "Kunshan".to_owned(),
        },
    };

    let receipt = repo.create(&order).await.unwrap();
    assert_eq!(receipt.total_price, Decimal::new(1885, 1));
    repo.create(&order).await.unwrap();

    let mine = repo.list_for_user(buyer).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|o| o.user_id == Some(buyer) && o.status == "pending"));
    assert_eq!(mine[0].items, order.items);
    assert_eq!(mine[0].contact_info, order.contact_info);
    assert_eq!(mine[0].total_price, Decimal::new(1885, 1));

    let all = repo.list().await.unwrap();
    assert!(all.iter().any(|o| o.id == receipt.id));
}
