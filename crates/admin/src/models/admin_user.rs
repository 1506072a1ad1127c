//! Admin user domain types.

use chrono::{DateTime, Utc};

use loomwear_core::{AdminUserId, Email};

pub use loomwear_core::AdminRole;

/// A back-office account. Separate from storefront customers.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: AdminUserId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
