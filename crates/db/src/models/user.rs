//! User domain types.

use serde::Serialize;

use profile_shop_core::{Role, UserId};

/// A shop account. The password never leaves the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name (unique).
    pub username: String,
    /// Account role.
    pub role: Role,
}
