//! Counts for the dashboard.

use serde::Serialize;
use sqlx::PgPool;

use loomwear_core::OrderStatus;

use super::RepositoryError;

/// Row counts per catalog and customer table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct EntityCounts {
    pub categories: i64,
    pub colors: i64,
    pub sizes: i64,
    pub products: i64,
    pub variants: i64,
    pub outfits: i64,
    pub customers: i64,
    pub orders: i64,
    /// Variants with nothing left to sell.
    pub out_of_stock: i64,
}

/// Orders in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts(&self) -> Result<EntityCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, EntityCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM shop.category) AS categories,
                (SELECT COUNT(*) FROM shop.color) AS colors,
                (SELECT COUNT(*) FROM shop.size) AS sizes,
                (SELECT COUNT(*) FROM shop.product) AS products,
                (SELECT COUNT(*) FROM shop.variant) AS variants,
                (SELECT COUNT(*) FROM shop.outfit) AS outfits,
                (SELECT COUNT(*) FROM shop.customer) AS customers,
                (SELECT COUNT(*) FROM shop."order") AS orders,
                (SELECT COUNT(*) FROM shop.variant WHERE stock = 0) AS out_of_stock
            "#,
        )
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }

    /// One entry per order status, zero included, in lifecycle order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, (OrderStatus, i64)>(
            r#"SELECT status, COUNT(*) FROM shop."order" GROUP BY status"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(fill_statuses(&rows))
    }
}

fn fill_statuses(rows: &[(OrderStatus, i64)]) -> Vec<StatusCount> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: rows
                .iter()
                .find(|(s, _)| *s == status)
                .map_or(0, |(_, count)| *count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_statuses_count_zero() {
        let filled = fill_statuses(&[(OrderStatus::Shipped, 4), (OrderStatus::Paid, 2)]);
        assert_eq!(filled.len(), OrderStatus::ALL.len());
        assert_eq!(
            filled.first(),
            Some(&StatusCount {
                status: OrderStatus::PendingPayment,
                count: 0
            })
        );
        let shipped = filled.iter().find(|c| c.status == OrderStatus::Shipped);
        assert_eq!(shipped.map(|c| c.count), Some(4));
    }
}
