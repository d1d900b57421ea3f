//! Product repository.

use profile_shop_core::ProductId;

use super::{
    RepositoryError, decimal_column, ensure_written, json_column, json_text, optional_text, required_id,
    required_text,
};
use crate::backend::Database;
use crate::models::{Product, ProductInput, parse_timestamp};
use crate::params;
use crate::statement::{Filter, Select, Statement};
use crate::value::{Row, Value};

/// Columns written by create and update, in statement order.
const PRODUCT_COLUMNS: &[&str] = &[
    "name",
    "description",
    "price",
    "stock",
    "category",
    "specs",
    "images",
    "model_url",
    "doc_url",
];

impl TryFrom<&Row> for Product {
    type Error = RepositoryError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(required_id(row, "id")?),
            name: required_text(row, "name")?,
            description: optional_text(row, "description"),
            price: decimal_column(row, "price")?,
            stock: row.integer("stock").unwrap_or_default(),
            category: optional_text(row, "category"),
            specs: json_column(row, "specs", "{}")?,
            images: json_column(row, "images", "[]")?,
            model_url: optional_text(row, "model_url"),
            doc_url: optional_text(row, "doc_url"),
            created_at: row.text("created_at").and_then(parse_timestamp),
        })
    }
}

fn product_params(input: &ProductInput) -> Result<Vec<Value>, RepositoryError> {
    Ok(params![
        input.name.as_str(),
        input.description.as_deref(),
        input.price,
        input.stock,
        input.category.as_deref(),
        json_text(&input.specs)?,
        json_text(&input.images)?,
        input.model_url.as_deref(),
        input.doc_url.as_deref(),
    ])
}

/// A by-id write that matched nothing.
fn found(affected: u64) -> Result<(), RepositoryError> {
    if affected == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Repository for the product catalogue.
pub struct ProductRepository<'a> {
    db: &'a Database,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// List every product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be decoded.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = self.db.query(&Select::all("products").into()).all(&[]).await?;
        rows.iter().map(Product::try_from).collect()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the row cannot be decoded.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let stmt = Select::all("products").filter(Filter::Id).into();
        let row = self.db.query(&stmt).get(&params![id]).await?;
        row.as_ref().map(Product::try_from).transpose()
    }

    /// Add a product to the catalogue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails or is refused.
    pub async fn create(&self, input: &ProductInput) -> Result<ProductId, RepositoryError> {
        let stmt = Statement::insert("products", PRODUCT_COLUMNS);
        let result = ensure_written(self.db.run(&stmt, &product_params(input)?).await?)?;
        tracing::info!(product_id = result.inserted_id, name = %input.name, "Created product");
        Ok(ProductId::new(result.inserted_id))
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this ID.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<(), RepositoryError> {
        let stmt = Statement::update("products", PRODUCT_COLUMNS);
        let mut params = product_params(input)?;
        params.push(id.into());
        found(self.db.run(&stmt, &params).await?.affected)
    }

    /// Set the stock level of a product, leaving every other field alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this ID.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_stock(&self, id: ProductId, stock: i64) -> Result<(), RepositoryError> {
        let stmt = Statement::update("products", &["stock"]);
        found(self.db.run(&stmt, &params![stock, id]).await?.affected)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this ID.
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let stmt = Statement::delete("products");
        found(self.db.run(&stmt, &params![id]).await?.affected)
    }
}
