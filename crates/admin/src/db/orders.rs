//! Order review and fulfilment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use loomwear_core::order::{Order, OrderLine, OrderSummary, ShippingAddress};
use loomwear_core::payment::{DeclineReason, PaymentIntent};
use loomwear_core::{CustomerId, OrderId, OrderLineId, OrderStatus, PaymentStatus, VariantId};

use super::{RepositoryError, money, to_count};

/// Errors from moving an order to a new status.
#[derive(Debug, Error)]
pub enum StatusChangeError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for StatusChangeError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: CustomerId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_started_at: DateTime<Utc>,
    payment_settles_at: DateTime<Utc>,
    decline_code: Option<String>,
    card_last4: String,
    subtotal: Decimal,
    shipping_name: String,
    shipping_address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order, RepositoryError> {
        let decline = self
            .decline_code
            .as_deref()
            .map(|code| {
                DeclineReason::from_code(code).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!("unknown decline code: {code}"))
                })
            })
            .transpose()?;

        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            status: self.status,
            payment: PaymentIntent {
                status: self.payment_status,
                started_at: self.payment_started_at,
                settles_at: self.payment_settles_at,
                decline,
            },
            card_last4: self.card_last4,
            subtotal: money(self.subtotal),
            shipping: ShippingAddress {
                name: self.shipping_name,
                address: self.shipping_address,
            },
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    variant_id: Option<VariantId>,
    product_title: String,
    variant_label: String,
    sku: String,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            variant_id: row.variant_id,
            product_title: row.product_title,
            variant_label: row.variant_label,
            sku: row.sku,
            unit_price: money(row.unit_price),
            quantity: to_count(row.quantity, "quantity")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    customer_id: CustomerId,
    status: OrderStatus,
    subtotal: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            status: row.status,
            subtotal: money(row.subtotal),
            item_count: row.item_count,
            created_at: row.created_at,
        }
    }
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Orders newest first, optionally only those in `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r#"
            SELECT o.id, o.customer_id, o.status, o.subtotal, o.created_at,
                   COALESCE(SUM(l.quantity), 0)::int8 AS item_count
            FROM shop."order" o
            LEFT JOIN shop.order_line l ON l.order_id = o.id
            WHERE $1::shop.order_status IS NULL OR o.status = $1
            GROUP BY o.id
            ORDER BY o.created_at DESC, o.id DESC
            "#,
        )
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderSummary::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, status, payment_status, payment_started_at,
                   payment_settles_at, decline_code, card_last4, subtotal,
                   shipping_name, shipping_address, created_at, updated_at
            FROM shop."order"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, variant_id, product_title, variant_label, sku, unit_price, quantity
            FROM shop.order_line
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        row.into_order(lines).map(Some)
    }

    /// Move an order to `next` if its lifecycle allows it.
    ///
    /// Unpaid orders can only be cancelled here; `Paid` and `PaymentFailed`
    /// are left to payment settlement.
    ///
    /// The current status is read under a row lock. Entering a status that
    /// releases stock puts the order's units back on their variants in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns `StatusChangeError::NotFound` for an unknown order and
    /// `StatusChangeError::InvalidTransition` when the move is not allowed.
    pub async fn change_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, StatusChangeError> {
        let mut tx = self.pool.begin().await?;

        let (current,) = sqlx::query_as::<_, (OrderStatus,)>(
            r#"SELECT status FROM shop."order" WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StatusChangeError::NotFound)?;

        if !current.admin_can_transition_to(next) {
            return Err(StatusChangeError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        // A cancelled order's unsettled payment is voided
        sqlx::query(
            r#"
            UPDATE shop."order"
            SET status = $2,
                payment_status = CASE
                    WHEN $2 = 'cancelled' AND payment_status = 'processing' THEN 'failed'
                    ELSE payment_status
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next)
        .execute(&mut *tx)
        .await?;

        if next.releases_stock() {
            let restocked = sqlx::query(
                r"
                UPDATE shop.variant AS v
                SET stock = v.stock + l.quantity
                FROM shop.order_line l
                WHERE l.order_id = $1 AND l.variant_id = v.id
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            tracing::info!(order_id = %id, restocked, "returned order stock to variants");
        }

        tx.commit().await?;

        self.get(id)
            .await?
            .ok_or(StatusChangeError::NotFound)
    }
}
