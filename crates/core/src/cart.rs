//! The cart state machine.
//!
//! Guests keep their cart in the session; customers keep theirs in the
//! database. Both are the same [`Cart`] value and go through the same
//! transitions, so the rules below hold everywhere:
//!
//! - a variant appears on at most one line
//! - every line quantity is in `1..=MAX_LINE_QUANTITY`
//! - no line exceeds the stock available when it was last touched
//!
//! Stock is supplied by the caller through [`StockLookup`]; this module never
//! does I/O.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, Money, VariantId};

/// Most units of one variant a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Errors returned by cart transitions.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("variant {0} does not exist")]
    UnknownVariant(VariantId),
    #[error("variant {0} is out of stock")]
    OutOfStock(VariantId),
    #[error("variant {0} is not in the cart")]
    NotInCart(VariantId),
}

/// Source of current stock levels.
///
/// Returns `None` for variants that do not exist (deleted, or never did).
pub trait StockLookup {
    fn stock_of(&self, variant: VariantId) -> Option<u32>;
}

impl StockLookup for HashMap<VariantId, u32> {
    fn stock_of(&self, variant: VariantId) -> Option<u32> {
        self.get(&variant).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// What a transition did to one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartChange {
    pub variant_id: VariantId,
    /// Quantity on the line afterwards (0 if removed).
    pub quantity: u32,
    /// The request asked for more than stock or the line cap allowed.
    pub clamped: bool,
}

/// An adjustment made while merging or reconciling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Quantity was reduced from `requested` to `kept`.
    Clamped {
        variant_id: VariantId,
        requested: u32,
        kept: u32,
    },
    /// Line removed: variant gone or sold out.
    Dropped { variant_id: VariantId },
}

/// How a guest cart is combined with a customer's saved cart on login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Sum quantities line by line.
    #[default]
    Merge,
    /// A non-empty guest cart wins outright.
    Replace,
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "replace" => Ok(Self::Replace),
            other => Err(format!("invalid cart merge strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub cart: Cart,
    pub adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

/// Largest quantity a line for a variant with `stock` units may hold.
fn line_cap(stock: u32) -> u32 {
    stock.min(MAX_LINE_QUANTITY)
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Rebuild a cart from stored lines (e.g. database rows).
    ///
    /// Duplicate variants are folded together and zero quantities dropped;
    /// stock is not consulted, call [`Cart::reconcile`] for that.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match cart.position(line.variant_id) {
                Some(i) => {
                    if let Some(existing) = cart.lines.get_mut(i) {
                        existing.quantity = existing
                            .quantity
                            .saturating_add(line.quantity)
                            .min(MAX_LINE_QUANTITY);
                    }
                }
                None => cart.lines.push(CartLine {
                    variant_id: line.variant_id,
                    quantity: line.quantity.min(MAX_LINE_QUANTITY),
                }),
            }
        }
        cart
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines (the badge count).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    #[must_use]
    pub fn quantity_of(&self, variant: VariantId) -> u32 {
        self.lines
            .iter()
            .find(|l| l.variant_id == variant)
            .map_or(0, |l| l.quantity)
    }

    #[must_use]
    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.lines.iter().map(|l| l.variant_id).collect()
    }

    fn position(&self, variant: VariantId) -> Option<usize> {
        self.lines.iter().position(|l| l.variant_id == variant)
    }

    /// Add `quantity` units of `variant`, creating the line if needed.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] for a zero quantity
    /// - [`CartError::UnknownVariant`] if the variant has no stock record
    /// - [`CartError::OutOfStock`] if no units are available
    pub fn add(
        &mut self,
        variant: VariantId,
        quantity: u32,
        stock: &dyn StockLookup,
    ) -> Result<CartChange, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let available = stock
            .stock_of(variant)
            .ok_or(CartError::UnknownVariant(variant))?;
        if available == 0 {
            return Err(CartError::OutOfStock(variant));
        }

        let cap = line_cap(available);
        let requested = self.quantity_of(variant).saturating_add(quantity);
        let kept = requested.min(cap);

        match self.position(variant) {
            Some(i) => {
                if let Some(line) = self.lines.get_mut(i) {
                    line.quantity = kept;
                }
            }
            None => self.lines.push(CartLine {
                variant_id: variant,
                quantity: kept,
            }),
        }

        Ok(CartChange {
            variant_id: variant,
            quantity: kept,
            clamped: kept < requested,
        })
    }

    /// Set a line to an exact quantity. Zero removes the line.
    ///
    /// If the variant has vanished or sold out, the line is removed and the
    /// change reports quantity 0 with `clamped` set.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if the variant has no line.
    pub fn set_quantity(
        &mut self,
        variant: VariantId,
        quantity: u32,
        stock: &dyn StockLookup,
    ) -> Result<CartChange, CartError> {
        let index = self.position(variant).ok_or(CartError::NotInCart(variant))?;

        if quantity == 0 {
            self.lines.remove(index);
            return Ok(CartChange {
                variant_id: variant,
                quantity: 0,
                clamped: false,
            });
        }

        let cap = stock.stock_of(variant).map_or(0, line_cap);
        if cap == 0 {
            self.lines.remove(index);
            return Ok(CartChange {
                variant_id: variant,
                quantity: 0,
                clamped: true,
            });
        }

        let kept = quantity.min(cap);
        if let Some(line) = self.lines.get_mut(index) {
            line.quantity = kept;
        }
        Ok(CartChange {
            variant_id: variant,
            quantity: kept,
            clamped: kept < quantity,
        })
    }

    /// Remove a line. Returns whether anything was removed.
    pub fn remove(&mut self, variant: VariantId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.variant_id != variant);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Re-check every line against current stock.
    ///
    /// Lines for missing or sold-out variants are dropped; lines above the
    /// available stock are reduced. Run before pricing a checkout.
    pub fn reconcile(&mut self, stock: &dyn StockLookup) -> Vec<Adjustment> {
        let mut adjustments = Vec::new();
        self.lines.retain_mut(|line| {
            let cap = stock.stock_of(line.variant_id).map_or(0, line_cap);
            if cap == 0 {
                adjustments.push(Adjustment::Dropped {
                    variant_id: line.variant_id,
                });
                return false;
            }
            if line.quantity > cap {
                adjustments.push(Adjustment::Clamped {
                    variant_id: line.variant_id,
                    requested: line.quantity,
                    kept: cap,
                });
                line.quantity = cap;
            }
            true
        });
        adjustments
    }

    /// Combine a customer's saved cart with the guest cart they built before
    /// logging in.
    ///
    /// With [`MergeStrategy::Merge`], saved lines keep their position, guest
    /// quantities are added onto matching lines and new guest lines are
    /// appended in guest order. With [`MergeStrategy::Replace`], a non-empty
    /// guest cart is used instead of the saved one; an empty guest cart
    /// never wipes a saved cart. Either way the result is reconciled against
    /// `stock`.
    #[must_use]
    pub fn merge(
        server: &Self,
        guest: &Self,
        strategy: MergeStrategy,
        stock: &dyn StockLookup,
    ) -> MergeOutcome {
        let mut combined = match strategy {
            MergeStrategy::Replace if !guest.is_empty() => guest.clone(),
            MergeStrategy::Replace => server.clone(),
            MergeStrategy::Merge => {
                let mut merged = server.clone();
                for line in &guest.lines {
                    match merged.position(line.variant_id) {
                        Some(i) => {
                            if let Some(existing) = merged.lines.get_mut(i) {
                                existing.quantity =
                                    existing.quantity.saturating_add(line.quantity);
                            }
                        }
                        None => merged.lines.push(*line),
                    }
                }
                merged
            }
        };

        let adjustments = combined.reconcile(stock);
        MergeOutcome {
            cart: combined,
            adjustments,
        }
    }
}

/// A cart line with its price resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub item_count: u32,
}

/// Price a cart.
///
/// Lines whose variant has no price (deleted since it was added) are left
/// out, as are lines priced in a currency other than `currency`.
#[must_use]
pub fn priced(
    cart: &Cart,
    prices: &HashMap<VariantId, Money>,
    currency: CurrencyCode,
) -> PricedCart {
    let mut subtotal = Money::zero(currency);
    let mut lines = Vec::with_capacity(cart.len());

    for line in cart.lines() {
        let Some(unit_price) = prices.get(&line.variant_id).copied() else {
            continue;
        };
        let line_total = unit_price.times(line.quantity);
        let Some(next) = subtotal.checked_add(line_total) else {
            continue;
        };
        subtotal = next;
        lines.push(PricedLine {
            variant_id: line.variant_id,
            quantity: line.quantity,
            unit_price,
            line_total,
        });
    }

    let item_count = lines.iter().map(|l| l.quantity).sum();
    PricedCart {
        lines,
        subtotal,
        item_count,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn v(id: i32) -> VariantId {
        VariantId::new(id)
    }

    fn stock(levels: &[(i32, u32)]) -> HashMap<VariantId, u32> {
        levels.iter().map(|&(id, n)| (v(id), n)).collect()
    }

    fn cart(lines: &[(i32, u32)]) -> Cart {
        Cart::from_lines(lines.iter().map(|&(id, quantity)| CartLine {
            variant_id: v(id),
            quantity,
        }))
    }

    #[test]
    fn add_creates_then_increments_line() {
        let levels = stock(&[(1, 5)]);
        let mut cart = Cart::new();

        let change = cart.add(v(1), 2, &levels).unwrap();
        assert_eq!(change.quantity, 2);
        assert!(!change.clamped);

        let change = cart.add(v(1), 1, &levels).unwrap();
        assert_eq!(change.quantity, 3);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn add_clamps_to_stock_and_line_cap() {
        let levels = stock(&[(1, 3), (2, 50)]);
        let mut cart = Cart::new();

        let change = cart.add(v(1), 5, &levels).unwrap();
        assert_eq!(change.quantity, 3);
        assert!(change.clamped);

        let change = cart.add(v(2), 25, &levels).unwrap();
        assert_eq!(change.quantity, MAX_LINE_QUANTITY);
        assert!(change.clamped);
    }

    #[test]
    fn add_rejects_zero_unknown_and_sold_out() {
        let levels = stock(&[(1, 0)]);
        let mut cart = Cart::new();

        assert_eq!(cart.add(v(1), 0, &levels), Err(CartError::InvalidQuantity));
        assert_eq!(cart.add(v(9), 1, &levels), Err(CartError::UnknownVariant(v(9))));
        assert_eq!(cart.add(v(1), 1, &levels), Err(CartError::OutOfStock(v(1))));
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let levels = stock(&[(1, 5), (2, 5)]);
        let mut cart = cart(&[(1, 2), (2, 1)]);

        let change = cart.set_quantity(v(1), 0, &levels).unwrap();
        assert_eq!(change.quantity, 0);
        assert_eq!(cart.variant_ids(), vec![v(2)]);
    }

    #[test]
    fn set_quantity_clamps_and_requires_line() {
        let levels = stock(&[(1, 4)]);
        let mut cart = cart(&[(1, 1)]);

        let change = cart.set_quantity(v(1), 9, &levels).unwrap();
        assert_eq!(change.quantity, 4);
        assert!(change.clamped);

        assert_eq!(
            cart.set_quantity(v(2), 1, &levels),
            Err(CartError::NotInCart(v(2)))
        );
    }

    #[test]
    fn set_quantity_on_sold_out_variant_drops_line() {
        let levels = stock(&[(1, 0)]);
        let mut cart = cart(&[(1, 2)]);

        let change = cart.set_quantity(v(1), 1, &levels).unwrap();
        assert_eq!(change.quantity, 0);
        assert!(change.clamped);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_reports_whether_line_existed() {
        let mut cart = cart(&[(1, 1)]);
        assert!(cart.remove(v(1)));
        assert!(!cart.remove(v(1)));
    }

    #[test]
    fn from_lines_folds_duplicates_and_zeroes() {
        let cart = cart(&[(1, 2), (2, 0), (1, 3), (3, 40)]);
        assert_eq!(
            cart.lines(),
            &[
                CartLine {
                    variant_id: v(1),
                    quantity: 5
                },
                CartLine {
                    variant_id: v(3),
                    quantity: MAX_LINE_QUANTITY
                },
            ]
        );
    }

    #[test]
    fn merge_sums_keeps_server_order_and_appends_guest_lines() {
        let levels = stock(&[(1, 10), (2, 10), (3, 10)]);
        let server = cart(&[(2, 1), (1, 1)]);
        let guest = cart(&[(3, 2), (1, 2)]);

        let outcome = Cart::merge(&server, &guest, MergeStrategy::Merge, &levels);
        assert_eq!(outcome.cart, cart(&[(2, 1), (1, 3), (3, 2)]));
        assert!(outcome.adjustments.is_empty());
    }

    #[test]
    fn merge_clamps_summed_lines_to_stock() {
        let levels = stock(&[(1, 4)]);
        let outcome = Cart::merge(
            &cart(&[(1, 3)]),
            &cart(&[(1, 3)]),
            MergeStrategy::Merge,
            &levels,
        );
        assert_eq!(outcome.cart.quantity_of(v(1)), 4);
        assert_eq!(
            outcome.adjustments,
            vec![Adjustment::Clamped {
                variant_id: v(1),
                requested: 6,
                kept: 4
            }]
        );
    }

    #[test]
    fn merge_drops_vanished_variants() {
        let levels = stock(&[(1, 5), (2, 0)]);
        let outcome = Cart::merge(
            &cart(&[(2, 1)]),
            &cart(&[(1, 1), (7, 1)]),
            MergeStrategy::Merge,
            &levels,
        );
        assert_eq!(outcome.cart, cart(&[(1, 1)]));
        assert_eq!(
            outcome.adjustments,
            vec![
                Adjustment::Dropped { variant_id: v(2) },
                Adjustment::Dropped { variant_id: v(7) },
            ]
        );
    }

    #[test]
    fn replace_uses_guest_cart_when_not_empty() {
        let levels = stock(&[(1, 5), (2, 5)]);
        let outcome = Cart::merge(
            &cart(&[(1, 4)]),
            &cart(&[(2, 1)]),
            MergeStrategy::Replace,
            &levels,
        );
        assert_eq!(outcome.cart, cart(&[(2, 1)]));
    }

    #[test]
    fn replace_with_empty_guest_keeps_server_cart() {
        let levels = stock(&[(1, 5)]);
        let outcome = Cart::merge(
            &cart(&[(1, 4)]),
            &Cart::new(),
            MergeStrategy::Replace,
            &levels,
        );
        assert_eq!(outcome.cart, cart(&[(1, 4)]));
    }

    #[test]
    fn merge_strategy_parses_case_insensitively() {
        assert_eq!("Replace".parse::<MergeStrategy>().unwrap(), MergeStrategy::Replace);
        assert_eq!(" merge ".parse::<MergeStrategy>().unwrap(), MergeStrategy::Merge);
        assert!("union".parse::<MergeStrategy>().is_err());
    }

    #[test]
    fn priced_skips_unpriced_lines() {
        let cart = cart(&[(1, 2), (2, 1), (3, 1)]);
        let prices: HashMap<VariantId, Money> = [
            (v(1), Money::from_cents(1500, CurrencyCode::USD)),
            (v(3), Money::from_cents(999, CurrencyCode::USD)),
        ]
        .into_iter()
        .collect();

        let priced = priced(&cart, &prices, CurrencyCode::USD);
        assert_eq!(priced.lines.len(), 2);
        assert_eq!(priced.item_count, 3);
        assert_eq!(priced.subtotal, Money::from_cents(3999, CurrencyCode::USD));
    }

    #[test]
    fn cart_survives_session_serialization() {
        let original = cart(&[(4, 2), (1, 1)]);
        let json = serde_json::to_string(&original).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }
}
