//! Database operations for the back-office.
//!
//! The admin binary owns every write to the catalog (`shop.category`,
//! `shop.color`, `shop.size`, `shop.product`, `shop.product_image`,
//! `shop.variant`, `shop.outfit`), manages customers and moves orders
//! through their lifecycle. Its own accounts live in `admin.admin_user`,
//! its sessions in `admin.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `/migrations` and run via:
//! ```bash
//! cargo run -p loomwear-cli -- migrate
//! ```

pub mod admin_users;
pub mod categories;
pub mod colors;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod outfits;
pub mod products;
pub mod sizes;

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use loomwear_core::{CurrencyCode, Handle, Money};

pub use admin_users::AdminUserRepository;
pub use categories::CategoryRepository;
pub use colors::ColorRepository;
pub use customers::CustomerRepository;
pub use dashboard::DashboardRepository;
pub use orders::{OrderRepository, StatusChangeError};
pub use outfits::OutfitRepository;
pub use products::ProductRepository;
pub use sizes::SizeRepository;

/// Store currency. Every catalog price is in this currency.
pub const STORE_CURRENCY: CurrencyCode = CurrencyCode::USD;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value no longer passes domain validation.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("not found")]
    NotFound,

    /// Unique violation, or a delete blocked by rows that still reference it.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A write pointed at a row that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

impl RepositoryError {
    /// Classify an insert or update failure.
    ///
    /// Unique violations become `Conflict`, foreign key violations
    /// `InvalidReference`.
    pub(crate) fn from_write(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::InvalidReference(format!("{what} refers to a missing record"));
            }
        }
        Self::Database(e)
    }

    /// Classify a delete failure: a foreign key violation means the row is
    /// still in use.
    pub(crate) fn from_delete(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(format!("{what} is still in use"));
        }
        Self::Database(e)
    }
}

pub(crate) fn parse_handle(value: &str) -> Result<Handle, RepositoryError> {
    Handle::parse(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid handle {value:?}: {e}")))
}

pub(crate) const fn money(amount: Decimal) -> Money {
    Money::new(amount, STORE_CURRENCY)
}

/// Convert a stored stock count to `u32`.
pub(crate) fn to_count(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Turn "no row affected" into `NotFound`.
pub(crate) fn expect_affected(result: &sqlx::postgres::PgQueryResult) -> Result<(), RepositoryError> {
    if result.rows_affected() == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_constraint_errors_stay_database_errors() {
        assert!(matches!(
            RepositoryError::from_write(sqlx::Error::RowNotFound, "color"),
            RepositoryError::Database(_)
        ));
        assert!(matches!(
            RepositoryError::from_delete(sqlx::Error::PoolTimedOut, "category"),
            RepositoryError::Database(_)
        ));
    }

    #[test]
    fn negative_stock_is_corruption() {
        assert_eq!(to_count(0, "stock").ok(), Some(0));
        assert!(matches!(
            to_count(-3, "stock"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
