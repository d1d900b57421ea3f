//! Domain models for the shop's persisted entities.
//!
//! Rows carry `specs`, `images`, `items` and `contact_info` as serialized JSON
//! text; the repositories decode them into these types.

pub mod order;
pub mod product;
pub mod user;

use chrono::{DateTime, NaiveDateTime, Utc};

pub use order::{ContactInfo, NewOrder, Order, OrderItem, OrderReceipt};
pub use product::{Product, ProductInput};
pub use user::User;

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 (emulator and `PostgreSQL`) and SQLite's
/// `CURRENT_TIMESTAMP` format, which is UTC without an offset.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
}
