//! Orders placed from a cart.
//!
//! Order lines are snapshots: title, variant label, SKU and unit price are
//! copied at checkout so later catalog edits never rewrite order history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payment::PaymentIntent;
use crate::types::{CustomerId, Money, OrderId, OrderLineId, OrderStatus, PaymentStatus, VariantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    /// `None` once the variant has been deleted from the catalog.
    pub variant_id: Option<VariantId>,
    pub product_title: String,
    pub variant_label: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// An order line before it has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineDraft {
    pub variant_id: VariantId,
    pub product_title: String,
    pub variant_label: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub payment: PaymentIntent,
    pub card_last4: String,
    pub subtotal: Money,
    pub shipping: ShippingAddress,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// The order status a settled payment moves this order to, if any.
    ///
    /// Only orders still awaiting payment react to settlement.
    #[must_use]
    pub fn status_after_payment(&self, payment: PaymentStatus) -> Option<OrderStatus> {
        if self.status != OrderStatus::PendingPayment {
            return None;
        }
        match payment {
            PaymentStatus::Processing => None,
            PaymentStatus::Succeeded => Some(OrderStatus::Paid),
            PaymentStatus::Failed => Some(OrderStatus::PaymentFailed),
        }
    }
}

/// One row of an order history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::types::CurrencyCode;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            customer_id: CustomerId::new(7),
            status,
            payment: PaymentIntent {
                status: PaymentStatus::Processing,
                started_at: now,
                settles_at: now + TimeDelta::seconds(3),
                decline: None,
            },
            card_last4: "4242".to_owned(),
            subtotal: Money::from_cents(5000, CurrencyCode::USD),
            shipping: ShippingAddress {
                name: "Ada".to_owned(),
                address: "1 Loom St".to_owned(),
            },
            lines: vec![
                OrderLine {
                    id: OrderLineId::new(1),
                    variant_id: Some(VariantId::new(3)),
                    product_title: "Linen Shirt".to_owned(),
                    variant_label: "Sand / M".to_owned(),
                    sku: "LS-SAND-M".to_owned(),
                    unit_price: Money::from_cents(2000, CurrencyCode::USD),
                    quantity: 2,
                },
                OrderLine {
                    id: OrderLineId::new(2),
                    variant_id: None,
                    product_title: "Scarf".to_owned(),
                    variant_label: "Red / OS".to_owned(),
                    sku: "SC-RED".to_owned(),
                    unit_price: Money::from_cents(1000, CurrencyCode::USD),
                    quantity: 1,
                },
            ],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn counts_items_and_line_totals() {
        let order = order(OrderStatus::PendingPayment);
        assert_eq!(order.item_count(), 3);
        assert_eq!(
            order.lines.first().unwrap().line_total(),
            Money::from_cents(4000, CurrencyCode::USD)
        );
    }

    #[test]
    fn settlement_moves_pending_orders_only() {
        let pending = order(OrderStatus::PendingPayment);
        assert_eq!(
            pending.status_after_payment(PaymentStatus::Succeeded),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            pending.status_after_payment(PaymentStatus::Failed),
            Some(OrderStatus::PaymentFailed)
        );
        assert_eq!(pending.status_after_payment(PaymentStatus::Processing), None);

        let cancelled = order(OrderStatus::Cancelled);
        assert_eq!(cancelled.status_after_payment(PaymentStatus::Succeeded), None);
    }
}
