//! Order page and its polled payment status.
//!
//! While a payment is processing the status fragment re-requests itself
//! every 2 seconds; once settled it renders without the trigger and polling
//! stops. Pages without JavaScript fall back to a meta refresh.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use chrono::Utc;
use tracing::instrument;

use loomwear_core::order::Order;
use loomwear_core::{OrderId, OrderStatus, PaymentStatus};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::CurrentCustomer;
use crate::state::AppState;

#[derive(Clone)]
pub struct OrderLineView {
    pub title: String,
    pub variant_label: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// The part of the order page that changes while payment settles.
#[derive(Clone)]
pub struct OrderStatusView {
    pub order_id: i32,
    pub status: &'static str,
    pub label: &'static str,
    pub payment: &'static str,
    pub message: String,
    /// Still waiting on the payment; keep polling.
    pub pending: bool,
}

impl From<&Order> for OrderStatusView {
    fn from(order: &Order) -> Self {
        let pending =
            order.status == OrderStatus::PendingPayment && !order.payment.status.is_settled();
        let message = match (order.status, order.payment.status) {
            (_, PaymentStatus::Processing) => "Confirming your payment…".to_owned(),
            (_, PaymentStatus::Failed) => order.payment.decline.map_or_else(
                || "Your payment failed.".to_owned(),
                |d| d.message().to_owned(),
            ),
            (OrderStatus::Cancelled, _) => "This order was cancelled.".to_owned(),
            (OrderStatus::Shipped, _) => "Your order is on its way.".to_owned(),
            (OrderStatus::Delivered, _) => "Your order was delivered.".to_owned(),
            _ => "Payment received. Thank you for your order!".to_owned(),
        };

        Self {
            order_id: order.id.as_i32(),
            status: order.status.as_str(),
            label: order.status.label(),
            payment: order.payment.status.as_str(),
            message,
            pending,
        }
    }
}

pub struct OrderView {
    pub id: i32,
    pub placed_at: String,
    pub lines: Vec<OrderLineView>,
    pub item_count: u32,
    pub subtotal: String,
    pub shipping_name: String,
    pub shipping_address: String,
    pub card_last4: String,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_i32(),
            placed_at: order.created_at.format("%B %-d, %Y").to_string(),
            lines: order
                .lines
                .iter()
                .map(|line| OrderLineView {
                    title: line.product_title.clone(),
                    variant_label: line.variant_label.clone(),
                    sku: line.sku.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.to_string(),
                    line_total: line.line_total().to_string(),
                })
                .collect(),
            item_count: order.item_count(),
            subtotal: order.subtotal.to_string(),
            shipping_name: order.shipping.name.clone(),
            shipping_address: order.shipping.address.clone(),
            card_last4: order.card_last4.clone(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub order: OrderView,
    pub status: OrderStatusView,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "partials/order_status.html")]
pub struct OrderStatusTemplate {
    pub status: OrderStatusView,
}

/// Load an order for its owner, settling a due payment on the way.
async fn load(state: &AppState, id: i32, customer: &CurrentCustomer) -> Result<Order> {
    state
        .checkout()
        .poll(OrderId::new(id), customer.id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Display an order. Other customers' orders are not found.
#[instrument(skip(state, customer, nonce), fields(customer_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    RequireAuth(customer): RequireAuth,
    CspNonce(nonce): CspNonce,
) -> Result<OrderShowTemplate> {
    let order = load(&state, id, &customer).await?;
    Ok(OrderShowTemplate {
        order: OrderView::from(&order),
        status: OrderStatusView::from(&order),
        customer: Some(customer),
        nonce,
    })
}

/// Payment status fragment, polled by the order page.
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    RequireAuth(customer): RequireAuth,
) -> Result<OrderStatusTemplate> {
    let order = load(&state, id, &customer).await?;
    Ok(OrderStatusTemplate {
        status: OrderStatusView::from(&order),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use loomwear_core::order::{OrderLine, ShippingAddress};
    use loomwear_core::payment::{DeclineReason, PaymentIntent};
    use loomwear_core::{CurrencyCode, CustomerId, Money, OrderLineId, VariantId};

    use super::*;

    fn order(status: OrderStatus, payment: PaymentStatus, decline: Option<DeclineReason>) -> Order {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap();
        Order {
            id: OrderId::new(42),
            customer_id: CustomerId::new(1),
            status,
            payment: PaymentIntent {
                status: payment,
                started_at: at,
                settles_at: at,
                decline,
            },
            card_last4: "4242".to_owned(),
            subtotal: Money::from_cents(9000, CurrencyCode::USD),
            shipping: ShippingAddress {
                name: "Ada".to_owned(),
                address: "12 Loom St".to_owned(),
            },
            lines: vec![OrderLine {
                id: OrderLineId::new(1),
                variant_id: Some(VariantId::new(3)),
                product_title: "Linen Shirt".to_owned(),
                variant_label: "Sand / M".to_owned(),
                sku: "LS-SD-M".to_owned(),
                unit_price: Money::from_cents(4500, CurrencyCode::USD),
                quantity: 2,
            }],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn processing_orders_keep_polling() {
        let view = OrderStatusView::from(&order(
            OrderStatus::PendingPayment,
            PaymentStatus::Processing,
            None,
        ));
        assert!(view.pending);
        assert_eq!(view.order_id, 42);
        assert_eq!(view.payment, "processing");
    }

    #[test]
    fn settled_orders_stop_polling() {
        let paid = OrderStatusView::from(&order(OrderStatus::Paid, PaymentStatus::Succeeded, None));
        assert!(!paid.pending);
        assert_eq!(paid.status, "paid");

        let failed = OrderStatusView::from(&order(
            OrderStatus::PaymentFailed,
            PaymentStatus::Failed,
            Some(DeclineReason::CardDeclined),
        ));
        assert!(!failed.pending);
        assert_eq!(failed.message, DeclineReason::CardDeclined.message());
    }

    #[test]
    fn order_view_snapshots_lines() {
        let view = OrderView::from(&order(OrderStatus::Paid, PaymentStatus::Succeeded, None));
        assert_eq!(view.placed_at, "March 4, 2026");
        assert_eq!(view.item_count, 2);
        let line = view.lines.first().unwrap();
        assert_eq!(line.line_total, "$90.00");
        assert_eq!(view.subtotal, "$90.00");
    }
}
