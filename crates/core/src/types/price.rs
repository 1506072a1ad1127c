//! Money using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of money in a single currency.
///
/// The amount is in the currency's standard unit (dollars, not cents) and
/// is always rounded to two decimal places for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency_code: CurrencyCode,
}

impl Money {
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Build from an integer count of minor units (cents).
    #[must_use]
    pub fn from_cents(cents: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(cents, 2), currency_code)
    }

    /// Unit price multiplied by a line quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Add two amounts, returning `None` on a currency mismatch.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        (self.currency_code == other.currency_code)
            .then(|| Self::new(self.amount + other.amount, self.currency_code))
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.amount.round_dp(2);
        write!(f, "{}{rounded:.2}", self.currency_code.symbol())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_to_two_places() {
        assert_eq!(Money::from_cents(1250, CurrencyCode::USD).to_string(), "$12.50");
        assert_eq!(Money::from_cents(7, CurrencyCode::EUR).to_string(), "€0.07");
        assert_eq!(
            Money::new(Decimal::new(30, 0), CurrencyCode::GBP).to_string(),
            "£30.00"
        );
    }

    #[test]
    fn times_multiplies_by_quantity() {
        let unit = Money::from_cents(1999, CurrencyCode::USD);
        assert_eq!(unit.times(3), Money::from_cents(5997, CurrencyCode::USD));
        assert_eq!(unit.times(0), Money::zero(CurrencyCode::USD));
    }

    #[test]
    fn checked_add_refuses_mixed_currencies() {
        let usd = Money::from_cents(100, CurrencyCode::USD);
        let eur = Money::from_cents(100, CurrencyCode::EUR);
        assert_eq!(usd.checked_add(usd), Some(Money::from_cents(200, CurrencyCode::USD)));
        assert_eq!(usd.checked_add(eur), None);
    }

    #[test]
    fn negative_detection_ignores_zero() {
        assert!(!Money::zero(CurrencyCode::USD).is_negative());
        assert!(Money::from_cents(-1, CurrencyCode::USD).is_negative());
    }
}
