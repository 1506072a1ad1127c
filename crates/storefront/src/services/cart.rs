//! Cart service.
//!
//! Guests keep their cart in the session under `guest_cart`; logged-in
//! customers keep it in `shop.cart_line`. Either way the lines are driven by
//! the same `loomwear_core::cart::Cart` state machine, checked against live
//! (uncached) stock on every change.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use loomwear_core::cart::{
    Adjustment, Cart, CartChange, CartError, MergeOutcome, MergeStrategy, StockLookup, priced,
};
use loomwear_core::{CustomerId, Money, VariantId};

use crate::db::catalog::STORE_CURRENCY;
use crate::db::{CartRepository, CatalogRepository, RepositoryError, VariantDetail};
use crate::models::{CurrentCustomer, session_keys};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    Guest,
    Customer(CustomerId),
}

/// Live variant details for the variants a cart operation touches.
///
/// Variants of inactive products report zero stock so they cannot be
/// added and get dropped on the next reconcile.
#[derive(Debug, Clone, Default)]
pub struct StockIndex {
    details: HashMap<VariantId, VariantDetail>,
}

impl StockIndex {
    /// Load details for `ids` straight from the database.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn load(pool: &PgPool, ids: &[VariantId]) -> Result<Self, RepositoryError> {
        let details = CatalogRepository::new(pool).variant_details(ids).await?;
        Ok(Self::from_details(details))
    }

    #[must_use]
    pub fn from_details(details: impl IntoIterator<Item = VariantDetail>) -> Self {
        Self {
            details: details.into_iter().map(|d| (d.variant_id, d)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, variant: VariantId) -> Option<&VariantDetail> {
        self.details.get(&variant)
    }

    fn prices(&self) -> HashMap<VariantId, Money> {
        self.details
            .values()
            .map(|d| (d.variant_id, d.price))
            .collect()
    }
}

impl StockLookup for StockIndex {
    fn stock_of(&self, variant: VariantId) -> Option<u32> {
        self.details
            .get(&variant)
            .map(|d| if d.is_active { d.stock } else { 0 })
    }
}

/// One priced cart line with its display details.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub detail: VariantDetail,
    pub quantity: u32,
    pub line_total: Money,
}

/// A reconciled, priced cart ready for display or checkout.
#[derive(Debug, Clone)]
pub struct CartContents {
    pub items: Vec<CartItem>,
    pub subtotal: Money,
    pub item_count: u32,
    /// Lines changed by the reconcile that produced this view.
    pub adjustments: Vec<Adjustment>,
}

impl CartContents {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Money::zero(STORE_CURRENCY),
            item_count: 0,
            adjustments: Vec::new(),
        }
    }

    /// Price `cart` with the details in `index`.
    #[must_use]
    pub fn build(cart: &Cart, index: &StockIndex, adjustments: Vec<Adjustment>) -> Self {
        let priced = priced(cart, &index.prices(), STORE_CURRENCY);
        let items = priced
            .lines
            .into_iter()
            .filter_map(|line| {
                index.get(line.variant_id).map(|detail| CartItem {
                    detail: detail.clone(),
                    quantity: line.quantity,
                    line_total: line.line_total,
                })
            })
            .collect();

        Self {
            items,
            subtotal: priced.subtotal,
            item_count: priced.item_count,
            adjustments,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart operations for the current request's session.
pub struct CartService<'a> {
    pool: &'a PgPool,
    session: &'a Session,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, session: &'a Session) -> Self {
        Self { pool, session }
    }

    /// Guest or logged-in customer, read from the session.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Session` if the session store fails.
    pub async fn owner(&self) -> Result<CartOwner, CartServiceError> {
        let customer = self
            .session
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await?;
        Ok(customer.map_or(CartOwner::Guest, |c| CartOwner::Customer(c.id)))
    }

    async fn load_for(&self, owner: CartOwner) -> Result<Cart, CartServiceError> {
        match owner {
            CartOwner::Guest => Ok(self
                .session
                .get::<Cart>(session_keys::GUEST_CART)
                .await?
                .unwrap_or_default()),
            CartOwner::Customer(id) => Ok(CartRepository::new(self.pool).load(id).await?),
        }
    }

    async fn store_for(&self, owner: CartOwner, cart: &Cart) -> Result<(), CartServiceError> {
        match owner {
            CartOwner::Guest => {
                self.session.insert(session_keys::GUEST_CART, cart).await?;
            }
            CartOwner::Customer(id) => CartRepository::new(self.pool).save(id, cart).await?,
        }
        Ok(())
    }

    /// The current cart, unreconciled.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if the session or database fails.
    pub async fn load(&self) -> Result<Cart, CartServiceError> {
        let owner = self.owner().await?;
        self.load_for(owner).await
    }

    /// Add units of a variant.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Cart` for invalid quantities, unknown or
    /// sold-out variants.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        variant: VariantId,
        quantity: u32,
    ) -> Result<(Cart, CartChange), CartServiceError> {
        let owner = self.owner().await?;
        let mut cart = self.load_for(owner).await?;
        let stock = StockIndex::load(self.pool, &[variant]).await?;

        let change = cart.add(variant, quantity, &stock)?;
        self.store_for(owner, &cart).await?;

        if change.clamped {
            tracing::info!(variant_id = %variant, kept = change.quantity, "add to cart clamped");
        }
        Ok((cart, change))
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Cart` if the variant is not in the cart.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        variant: VariantId,
        quantity: u32,
    ) -> Result<CartChange, CartServiceError> {
        let owner = self.owner().await?;
        let mut cart = self.load_for(owner).await?;
        let stock = StockIndex::load(self.pool, &[variant]).await?;

        let change = cart.set_quantity(variant, quantity, &stock)?;
        self.store_for(owner, &cart).await?;
        Ok(change)
    }

    /// Remove a line. Returns whether it was there.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if the session or database fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, variant: VariantId) -> Result<bool, CartServiceError> {
        let owner = self.owner().await?;
        let mut cart = self.load_for(owner).await?;
        let removed = cart.remove(variant);
        if removed {
            self.store_for(owner, &cart).await?;
        }
        Ok(removed)
    }

    /// Total units in the cart, for the header badge.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if the session or database fails.
    pub async fn count(&self) -> Result<u32, CartServiceError> {
        Ok(self.load().await?.item_count())
    }

    /// The cart reconciled against live stock and priced.
    ///
    /// A reconcile that changes anything is saved back so the cart badge and
    /// checkout agree with what was shown.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if the session or database fails.
    pub async fn contents(&self) -> Result<CartContents, CartServiceError> {
        let owner = self.owner().await?;
        let mut cart = self.load_for(owner).await?;
        if cart.is_empty() {
            return Ok(CartContents::empty());
        }

        let stock = StockIndex::load(self.pool, &cart.variant_ids()).await?;
        let adjustments = cart.reconcile(&stock);
        if !adjustments.is_empty() {
            self.store_for(owner, &cart).await?;
        }
        Ok(CartContents::build(&cart, &stock, adjustments))
    }

    /// Fold the session's guest cart into `customer`'s saved cart.
    ///
    /// Called right after login or registration. The guest cart is removed
    /// from the session afterwards whatever the strategy.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if the session or database fails.
    #[instrument(skip(self))]
    pub async fn merge_guest_cart(
        &self,
        customer: CustomerId,
        strategy: MergeStrategy,
    ) -> Result<MergeOutcome, CartServiceError> {
        let guest = self
            .session
            .get::<Cart>(session_keys::GUEST_CART)
            .await?
            .unwrap_or_default();
        let repo = CartRepository::new(self.pool);
        let server = repo.load(customer).await?;

        let mut ids = server.variant_ids();
        ids.extend(guest.variant_ids());
        ids.sort_unstable();
        ids.dedup();
        let stock = StockIndex::load(self.pool, &ids).await?;

        let outcome = Cart::merge(&server, &guest, strategy, &stock);
        repo.save(customer, &outcome.cart).await?;
        self.session
            .remove::<Cart>(session_keys::GUEST_CART)
            .await?;

        tracing::info!(
            customer_id = %customer,
            guest_lines = guest.len(),
            saved_lines = server.len(),
            merged_lines = outcome.cart.len(),
            adjustments = outcome.adjustments.len(),
            "merged guest cart"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loomwear_core::cart::CartLine;
    use loomwear_core::{Handle, ProductId};

    use super::*;

    fn detail(id: i32, stock: u32, cents: i64, is_active: bool) -> VariantDetail {
        VariantDetail {
            variant_id: VariantId::new(id),
            product_id: ProductId::new(1),
            product_title: "Linen Shirt".to_owned(),
            product_handle: Handle::parse("linen-shirt").unwrap(),
            label: "Sand / M".to_owned(),
            sku: format!("LS-{id}"),
            stock,
            price: Money::from_cents(cents, STORE_CURRENCY),
            image_url: None,
            is_active,
        }
    }

    #[test]
    fn inactive_products_have_no_stock() {
        let index = StockIndex::from_details([detail(1, 5, 100, true), detail(2, 5, 100, false)]);
        assert_eq!(index.stock_of(VariantId::new(1)), Some(5));
        assert_eq!(index.stock_of(VariantId::new(2)), Some(0));
        assert_eq!(index.stock_of(VariantId::new(3)), None);
    }

    #[test]
    fn contents_prices_lines_in_cart_order() {
        let index = StockIndex::from_details([detail(1, 5, 2500, true), detail(2, 5, 1000, true)]);
        let cart = Cart::from_lines([
            CartLine {
                variant_id: VariantId::new(2),
                quantity: 3,
            },
            CartLine {
                variant_id: VariantId::new(1),
                quantity: 1,
            },
        ]);

        let contents = CartContents::build(&cart, &index, Vec::new());
        assert_eq!(contents.item_count, 4);
        assert_eq!(contents.subtotal, Money::from_cents(5500, STORE_CURRENCY));
        let order: Vec<i32> = contents
            .items
            .iter()
            .map(|i| i.detail.variant_id.as_i32())
            .collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn contents_skips_vanished_variants() {
        let index = StockIndex::from_details([detail(1, 5, 2500, true)]);
        let cart = Cart::from_lines([
            CartLine {
                variant_id: VariantId::new(1),
                quantity: 1,
            },
            CartLine {
                variant_id: VariantId::new(9),
                quantity: 1,
            },
        ]);

        let contents = CartContents::build(&cart, &index, Vec::new());
        assert_eq!(contents.items.len(), 1);
        assert_eq!(contents.subtotal, Money::from_cents(2500, STORE_CURRENCY));
    }

    #[test]
    fn empty_contents_is_zero() {
        let contents = CartContents::empty();
        assert!(contents.is_empty());
        assert_eq!(contents.subtotal.to_string(), "$0.00");
    }
}
