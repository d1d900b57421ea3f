//! Product domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use profile_shop_core::ProductId;

/// A catalogue product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Product name (the SKU for profiles).
    pub name: String,
    pub description: Option<String>,
    /// Unit price.
    pub price: Decimal,
    /// Units in stock.
    pub stock: i64,
    pub category: Option<String>,
    /// Free-form specification object.
    pub specs: serde_json::Value,
    /// Image URLs.
    pub images: Vec<String>,
    /// URL of the downloadable 3D model.
    pub model_url: Option<String>,
    /// URL of the datasheet.
    pub doc_url: Option<String>,
    /// When the product was created.
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields supplied when creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "empty_object")]
    pub specs: serde_json::Value,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub doc_url: Option<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
