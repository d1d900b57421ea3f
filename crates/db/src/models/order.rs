//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use profile_shop_core::{OrderId, ProductId, UserId};

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price at checkout.
    pub price: Decimal,
}

impl OrderItem {
    /// Price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Shipping contact supplied at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Buyer, if the order was placed while logged in.
    pub user_id: Option<UserId>,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
    /// Open status string; new orders are `pending`.
    pub status: String,
    pub contact_info: ContactInfo,
    /// When the order was placed.
    pub created_at: Option<DateTime<Utc>>,
}

/// A checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub contact_info: ContactInfo,
}

impl NewOrder {
    /// Sum of price times quantity over all items.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(OrderItem::subtotal).sum()
    }
}

/// What checkout reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub id: OrderId,
    pub status: String,
    pub total_price: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let order: NewOrder = serde_json::from_value(serde_json::json!({
            "user_id": 2,
            "items": [
                {"productId": 1, "quantity": 3, "price": "88.00"},
                {"productId": 4, "quantity": 1, "price": "12.5"}
            ],
            "contact_info": {"name": "Li", "phone": "123", "address": "Road 1"}
        }))
        .unwrap();
        assert_eq!(order.total(), Decimal::from_str("276.50").unwrap());
        assert_eq!(order.user_id, Some(UserId::new(2)));
    }

    #[test]
    fn test_item_uses_camel_case_product_id() {
        let item = OrderItem {
            product_id: ProductId::new(7),
            quantity: 2,
            price: Decimal::new(150, 2),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["productId"], 7);
        assert!(json.get("product_id").is_none());
    }

    #[test]
    fn test_missing_contact_fields_default() {
        let contact: ContactInfo = serde_json::from_str(r#"{"name":"Ann"}"#).unwrap();
        assert_eq!(contact.name, "Ann");
        assert!(contact.address.is_empty());
    }
}
