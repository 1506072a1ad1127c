//! Storefront customers as the back-office sees them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use loomwear_core::{CustomerId, Email};

/// A storefront account. The password hash never leaves the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    pub is_active: bool,
    pub order_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
