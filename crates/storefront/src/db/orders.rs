//! Order placement and payment settlement.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use loomwear_core::order::{Order, OrderLine, OrderLineDraft, OrderSummary, ShippingAddress};
use loomwear_core::payment::{DeclineReason, PaymentIntent};
use loomwear_core::{
    CustomerId, Handle, Money, OrderId, OrderLineId, OrderStatus, PaymentStatus, VariantId,
};

use super::catalog::{STORE_CURRENCY, parse_handle};
use super::{RepositoryError, to_column, to_count};

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// Stock ran out between reviewing the cart and placing the order.
    #[error("only {available} left of variant {variant_id}")]
    InsufficientStock {
        variant_id: VariantId,
        available: u32,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// An order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLineDraft>,
    pub subtotal: Money,
    pub shipping: ShippingAddress,
    pub payment: PaymentIntent,
    pub card_last4: String,
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
            subtotal: Money::new(self.subtotal, STORE_CURRENCY),
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
            unit_price: Money::new(row.unit_price, STORE_CURRENCY),
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
            subtotal: Money::new(row.subtotal, STORE_CURRENCY),
            item_count: row.item_count,
            created_at: row.created_at,
        }
    }
}

/// Check requested quantities against locked stock levels.
fn check_stock(
    lines: &[OrderLineDraft],
    stock: &HashMap<VariantId, u32>,
) -> Result<(), PlaceOrderError> {
    for line in lines {
        let available = stock.get(&line.variant_id).copied().unwrap_or(0);
        if available < line.quantity {
            return Err(PlaceOrderError::InsufficientStock {
                variant_id: line.variant_id,
                available,
            });
        }
    }
    Ok(())
}

/// Repository for customer orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order in one transaction.
    ///
    /// Locks the ordered variants, verifies and decrements their stock,
    /// writes the order and its line snapshots and clears the customer's
    /// saved cart. Nothing is written if any line is short.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::InsufficientStock` if a variant no longer
    /// has enough units, `PlaceOrderError::Repository` for database errors.
    pub async fn place(&self, order: &NewOrder) -> Result<OrderId, PlaceOrderError> {
        let variant_ids: Vec<VariantId> = order.lines.iter().map(|l| l.variant_id).collect();
        let quantities: Vec<i32> = order.lines.iter().map(|l| to_column(l.quantity)).collect();

        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, (VariantId, i32)>(
            "SELECT id, stock FROM shop.variant WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&variant_ids)
        .fetch_all(&mut *tx)
        .await?;
        let stock = locked
            .into_iter()
            .map(|(id, stock)| Ok((id, to_count(stock, "stock")?)))
            .collect::<Result<HashMap<_, _>, RepositoryError>>()?;
        check_stock(&order.lines, &stock)?;

        sqlx::query(
            r"
            UPDATE shop.variant AS v
            SET stock = v.stock - d.quantity
            FROM UNNEST($1::int4[], $2::int4[]) AS d(id, quantity)
            WHERE v.id = d.id
            ",
        )
        .bind(&variant_ids)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        let (order_id,) = sqlx::query_as::<_, (OrderId,)>(
            r#"
            INSERT INTO shop."order"
                (customer_id, status, payment_status, payment_started_at, payment_settles_at,
                 decline_code, card_last4, subtotal, shipping_name, shipping_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(order.customer_id)
        .bind(OrderStatus::PendingPayment)
        .bind(order.payment.status)
        .bind(order.payment.started_at)
        .bind(order.payment.settles_at)
        .bind(order.payment.decline.map(DeclineReason::as_str))
        .bind(&order.card_last4)
        .bind(order.subtotal.amount)
        .bind(&order.shipping.name)
        .bind(&order.shipping.address)
        .fetch_one(&mut *tx)
        .await?;

        let titles: Vec<&str> = order.lines.iter().map(|l| l.product_title.as_str()).collect();
        let labels: Vec<&str> = order.lines.iter().map(|l| l.variant_label.as_str()).collect();
        let skus: Vec<&str> = order.lines.iter().map(|l| l.sku.as_str()).collect();
        let prices: Vec<Decimal> = order.lines.iter().map(|l| l.unit_price.amount).collect();

        sqlx::query(
            r"
            INSERT INTO shop.order_line
                (order_id, variant_id, product_title, variant_label, sku, unit_price, quantity)
            SELECT $1, * FROM UNNEST($2::int4[], $3::text[], $4::text[], $5::text[],
                                     $6::numeric[], $7::int4[])
            ",
        )
        .bind(order_id)
        .bind(&variant_ids)
        .bind(&titles)
        .bind(&labels)
        .bind(&skus)
        .bind(&prices)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM shop.cart_line WHERE customer_id = $1")
            .bind(order.customer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(order_id)
    }

    /// An order, only if it belongs to `customer`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_customer(
        &self,
        id: OrderId,
        customer: CustomerId,
    ) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, customer_id, status, payment_status, payment_started_at,
                   payment_settles_at, decline_code, card_last4, subtotal,
                   shipping_name, shipping_address, created_at, updated_at
            FROM shop."order"
            WHERE id = $1 AND customer_id = $2
            "#,
        )
        .bind(id)
        .bind(customer)
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

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer: CustomerId,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r#"
            SELECT o.id, o.customer_id, o.status, o.subtotal, o.created_at,
                   COALESCE(SUM(l.quantity), 0)::int8 AS item_count
            FROM shop."order" o
            LEFT JOIN shop.order_line l ON l.order_id = o.id
            WHERE o.customer_id = $1
            GROUP BY o.id
            ORDER BY o.created_at DESC, o.id DESC
            "#,
        )
        .bind(customer)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderSummary::from).collect())
    }

    /// Handles of the products an order's lines still point at.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` for a malformed stored handle.
    pub async fn product_handles(&self, id: OrderId) -> Result<Vec<Handle>, RepositoryError> {
        sqlx::query_scalar::<_, String>(
            r"
            SELECT DISTINCT p.handle
            FROM shop.order_line l
            JOIN shop.variant v ON v.id = l.variant_id
            JOIN shop.product p ON p.id = v.product_id
            WHERE l.order_id = $1
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .iter()
        .map(|handle| parse_handle(handle))
        .collect()
    }

    /// Persist a settled payment.
    ///
    /// The update only applies while the order is still pending with a
    /// processing payment, so concurrent polls settle it exactly once.
    /// Entering a status that releases stock puts the order's units back.
    /// Returns whether this call did the settling.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn record_settlement(
        &self,
        id: OrderId,
        payment: PaymentStatus,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let settled = sqlx::query_as::<_, (OrderId,)>(
            r#"
            UPDATE shop."order"
            SET payment_status = $2, status = $3, updated_at = NOW()
            WHERE id = $1
              AND payment_status = 'processing'
              AND status = 'pending_payment'
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(payment)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

        if settled && status.releases_stock() {
            sqlx::query(
                r"
                UPDATE shop.variant AS v
                SET stock = v.stock + l.quantity
                FROM shop.order_line l
                WHERE l.order_id = $1 AND l.variant_id = v.id
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(settled)
    }
}
