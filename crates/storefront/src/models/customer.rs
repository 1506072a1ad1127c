//! Customer domain type.

use chrono::{DateTime, Utc};

use loomwear_core::{CustomerId, Email};

/// A storefront account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
    /// Deactivated accounts cannot log in.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
