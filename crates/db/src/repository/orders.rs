//! Order repository.

use profile_shop_core::{DEFAULT_ORDER_STATUS, OrderId, UserId};

use super::{
    RepositoryError, decimal_column, ensure_written, json_column, json_text, required_id,
};
use crate::backend::Database;
use crate::models::{NewOrder, Order, OrderReceipt, parse_timestamp};
use crate::params;
use crate::statement::{Filter, Select, Statement};
use crate::value::Row;

impl TryFrom<&Row> for Order {
    type Error = RepositoryError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(required_id(row, "id")?),
            user_id: row.integer("user_id").map(UserId::new),
            items: json_column(row, "items", "[]")?,
            total_price: decimal_column(row, "total_price")?,
            status: row.text("status").unwrap_or(DEFAULT_ORDER_STATUS).to_owned(),
            contact_info: json_column(row, "contact_info", "{}")?,
            created_at: row.text("created_at").and_then(parse_timestamp),
        })
    }
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    db: &'a Database,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// All orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be decoded.
    pub async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        let stmt = Select::all("orders").newest_first().into();
        let rows = self.db.query(&stmt).all(&[]).await?;
        rows.iter().map(Order::try_from).collect()
    }

    /// Orders placed by one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row cannot be decoded.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let stmt = Select::all("orders")
            .filter(Filter::UserId)
            .newest_first()
            .into();
        let rows = self.db.query(&stmt).all(&params![user_id]).await?;
        rows.iter().map(Order::try_from).collect()
    }

    /// Place an order. The total is the sum of price times quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails or is refused.
    pub async fn create(&self, order: &NewOrder) -> Result<OrderReceipt, RepositoryError> {
        let total = order.total();
        let stmt = Statement::insert(
            "orders",
            &["user_id", "items", "total_price", "status", "contact_info"],
        );
        let result = ensure_written(
            self.db
                .run(
                    &stmt,
                    &params![
                        order.user_id,
                        json_text(&order.items)?,
                        total,
                        DEFAULT_ORDER_STATUS,
                        json_text(&order.contact_info)?,
                    ],
                )
                .await?,
        )?;

        tracing::info!(order_id = result.inserted_id, %total, "Order placed");
        Ok(OrderReceipt {
            id: OrderId::new(result.inserted_id),
            status: DEFAULT_ORDER_STATUS.to_owned(),
            total_price: total,
        })
    }
}
