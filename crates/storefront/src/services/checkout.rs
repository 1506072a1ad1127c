//! Checkout: turning a customer's cart into an order, and settling its
//! simulated payment when the order page polls.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use loomwear_core::cart::Adjustment;
use loomwear_core::order::{Order, OrderLineDraft, ShippingAddress};
use loomwear_core::payment::{CardDetails, PaymentSimulator};
use loomwear_core::{CustomerId, OrderId, VariantId};

use crate::db::orders::{NewOrder, PlaceOrderError};
use crate::db::{CartRepository, OrderRepository, RepositoryError};
use crate::services::CatalogService;
use crate::services::cart::{CartContents, StockIndex};

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    /// Reconciling against live stock changed the cart; the customer has to
    /// review it again before paying.
    #[error("some items in your cart changed, please review it")]
    CartChanged(Vec<Adjustment>),

    #[error("{0} is required")]
    MissingShipping(&'static str),

    #[error("only {available} left of variant {variant_id}")]
    InsufficientStock {
        variant_id: VariantId,
        available: u32,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PlaceOrderError> for CheckoutError {
    fn from(e: PlaceOrderError) -> Self {
        match e {
            PlaceOrderError::InsufficientStock {
                variant_id,
                available,
            } => Self::InsufficientStock {
                variant_id,
                available,
            },
            PlaceOrderError::Repository(e) => Self::Repository(e),
        }
    }
}

/// Trim and check a shipping address.
///
/// # Errors
///
/// Returns `CheckoutError::MissingShipping` naming the first blank field.
pub fn validate_shipping(name: &str, address: &str) -> Result<ShippingAddress, CheckoutError> {
    let name = name.trim();
    let address = address.trim();
    if name.is_empty() {
        return Err(CheckoutError::MissingShipping("name"));
    }
    if address.is_empty() {
        return Err(CheckoutError::MissingShipping("address"));
    }
    Ok(ShippingAddress {
        name: name.to_owned(),
        address: address.to_owned(),
    })
}

/// Snapshot the priced cart into order lines.
fn order_lines(contents: &CartContents) -> Vec<OrderLineDraft> {
    contents
        .items
        .iter()
        .map(|item| OrderLineDraft {
            variant_id: item.detail.variant_id,
            product_title: item.detail.product_title.clone(),
            variant_label: item.detail.label.clone(),
            sku: item.detail.sku.clone(),
            unit_price: item.detail.price,
            quantity: item.quantity,
        })
        .collect()
}

pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    catalog: &'a CatalogService,
    payments: PaymentSimulator,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        catalog: &'a CatalogService,
        payments: PaymentSimulator,
    ) -> Self {
        Self {
            pool,
            catalog,
            payments,
        }
    }

    /// Reconcile and price a customer's saved cart.
    ///
    /// Any adjustment is saved and reported in the returned contents.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn review(&self, customer: CustomerId) -> Result<CartContents, RepositoryError> {
        let carts = CartRepository::new(self.pool);
        let mut cart = carts.load(customer).await?;
        if cart.is_empty() {
            return Ok(CartContents::empty());
        }

        let stock = StockIndex::load(self.pool, &cart.variant_ids()).await?;
        let adjustments = cart.reconcile(&stock);
        if !adjustments.is_empty() {
            carts.save(customer, &cart).await?;
        }
        Ok(CartContents::build(&cart, &stock, adjustments))
    }

    /// Place an order for everything in the customer's cart and start its
    /// payment.
    ///
    /// The card has already been validated by the caller, so a malformed
    /// card never reaches the database.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::EmptyCart` if nothing is left to buy
    /// - `CheckoutError::CartChanged` if stock moved since the cart was shown
    /// - `CheckoutError::InsufficientStock` if stock ran out while placing
    /// - `CheckoutError::Repository` for database errors
    #[instrument(skip(self, shipping, card), fields(customer_id = %customer))]
    pub async fn place_order(
        &self,
        customer: CustomerId,
        shipping: ShippingAddress,
        card: &CardDetails,
        now: DateTime<Utc>,
    ) -> Result<OrderId, CheckoutError> {
        let contents = self.review(customer).await?;
        if !contents.adjustments.is_empty() {
            return Err(CheckoutError::CartChanged(contents.adjustments));
        }
        if contents.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let order = NewOrder {
            customer_id: customer,
            lines: order_lines(&contents),
            subtotal: contents.subtotal,
            shipping,
            payment: self.payments.start(card, now),
            card_last4: card.last4().to_owned(),
        };
        let order_id = OrderRepository::new(self.pool).place(&order).await?;

        for item in &contents.items {
            self.catalog
                .invalidate_product(&item.detail.product_handle)
                .await;
        }

        tracing::info!(
            order_id = %order_id,
            lines = order.lines.len(),
            subtotal = %order.subtotal,
            "order placed"
        );
        Ok(order_id)
    }

    /// Load an order for its owner, settling its payment if it is due.
    ///
    /// Settlement is persisted at most once however many polls race; a
    /// failed payment puts the reserved stock back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip(self), fields(order_id = %id, customer_id = %customer))]
    pub async fn poll(
        &self,
        id: OrderId,
        customer: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        let orders = OrderRepository::new(self.pool);
        let Some(order) = orders.get_for_customer(id, customer).await? else {
            return Ok(None);
        };

        let payment = self.payments.poll(&order.payment, now);
        if payment.status == order.payment.status {
            return Ok(Some(order));
        }
        let Some(next) = order.status_after_payment(payment.status) else {
            return Ok(Some(order));
        };

        if orders.record_settlement(id, payment.status, next).await? {
            tracing::info!(payment = %payment.status, status = %next, "payment settled");
            if next.releases_stock() {
                for handle in orders.product_handles(id).await? {
                    self.catalog.invalidate_product(&handle).await;
                }
            }
        }
        orders.get_for_customer(id, customer).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loomwear_core::{Handle, Money, ProductId};

    use super::*;
    use crate::db::VariantDetail;
    use crate::db::catalog::STORE_CURRENCY;
    use crate::services::cart::CartItem;

    #[test]
    fn shipping_is_trimmed() {
        let shipping = validate_shipping("  Ada Lovelace ", "\n12 Loom St\n").unwrap();
        assert_eq!(shipping.name, "Ada Lovelace");
        assert_eq!(shipping.address, "12 Loom St");
    }

    #[test]
    fn blank_shipping_fields_are_named() {
        assert!(matches!(
            validate_shipping(" ", "12 Loom St"),
            Err(CheckoutError::MissingShipping("name"))
        ));
        assert!(matches!(
            validate_shipping("Ada", ""),
            Err(CheckoutError::MissingShipping("address"))
        ));
    }

    #[test]
    fn order_lines_snapshot_cart_items() {
        let detail = VariantDetail {
            variant_id: VariantId::new(7),
            product_id: ProductId::new(1),
            product_title: "Wool Coat".to_owned(),
            product_handle: Handle::parse("wool-coat").unwrap(),
            label: "Navy / L".to_owned(),
            sku: "WC-NV-L".to_owned(),
            stock: 4,
            price: Money::from_cents(18_000, STORE_CURRENCY),
            image_url: None,
            is_active: true,
        };
        let contents = CartContents {
            items: vec![CartItem {
                detail,
                quantity: 2,
                line_total: Money::from_cents(36_000, STORE_CURRENCY),
            }],
            subtotal: Money::from_cents(36_000, STORE_CURRENCY),
            item_count: 2,
            adjustments: Vec::new(),
        };

        let lines = order_lines(&contents);
        assert_eq!(lines.len(), 1);
        let line = lines.first().unwrap();
        assert_eq!(line.variant_id, VariantId::new(7));
        assert_eq!(line.variant_label, "Navy / L");
        assert_eq!(line.unit_price, Money::from_cents(18_000, STORE_CURRENCY));
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn stock_shortfall_keeps_its_details() {
        let err: CheckoutError = PlaceOrderError::InsufficientStock {
            variant_id: VariantId::new(3),
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { available: 1, .. }
        ));
    }
}
