//! Card validation and the simulated payment processor.
//!
//! There is no real gateway. An order's payment starts out `Processing` and
//! settles once `settle_after` has elapsed; the storefront polls until then.
//! Outcomes are decided up front from the card number so test cards behave
//! predictably:
//!
//! | card number ends in | outcome          |
//! |---------------------|------------------|
//! | `0002`              | declined         |
//! | `0069`              | declined, expired|
//! | anything else       | approved         |

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PaymentStatus;

/// Card details rejected before any payment is attempted.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentError {
    #[error("card number must be 12 to 19 digits")]
    CardNumberLength,
    #[error("card number is not valid")]
    CardNumberChecksum,
    #[error("expiry month must be between 1 and 12")]
    ExpiryMonth,
    #[error("card has expired")]
    Expired,
    #[error("security code must be 3 or 4 digits")]
    Cvc,
}

/// Why a simulated payment was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    CardDeclined,
    ExpiredCard,
}

impl DeclineReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CardDeclined => "card_declined",
            Self::ExpiredCard => "expired_card",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "card_declined" => Some(Self::CardDeclined),
            "expired_card" => Some(Self::ExpiredCard),
            _ => None,
        }
    }

    /// Message shown to the shopper.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::CardDeclined => "Your card was declined.",
            Self::ExpiredCard => "Your card issuer reports this card as expired.",
        }
    }
}

/// Validated card input. Only the last four digits are retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    last4: String,
    decline: Option<DeclineReason>,
}

/// Luhn checksum over ASCII digits.
fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, b) in digits.bytes().rev().enumerate() {
        let mut d = u32::from(b - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

impl CardDetails {
    /// Validate card form input as of `today`.
    ///
    /// Spaces and dashes in the number are ignored. A two-digit year is read
    /// as 20xx. A card is valid through the last day of its expiry month.
    ///
    /// # Errors
    ///
    /// Returns the first [`PaymentError`] the input trips.
    pub fn parse(
        number: &str,
        expiry_month: u32,
        expiry_year: i32,
        cvc: &str,
        today: NaiveDate,
    ) -> Result<Self, PaymentError> {
        let digits: String = number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if !(12..=19).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PaymentError::CardNumberLength);
        }
        if !luhn_valid(&digits) {
            return Err(PaymentError::CardNumberChecksum);
        }

        if !(1..=12).contains(&expiry_month) {
            return Err(PaymentError::ExpiryMonth);
        }
        let year = if expiry_year < 100 {
            2000 + expiry_year
        } else {
            expiry_year
        };
        if (year, expiry_month) < (today.year(), today.month()) {
            return Err(PaymentError::Expired);
        }

        let cvc = cvc.trim();
        if !(3..=4).contains(&cvc.len()) || !cvc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PaymentError::Cvc);
        }

        let last4 = digits
            .get(digits.len() - 4..)
            .unwrap_or_default()
            .to_owned();
        let decline = match last4.as_str() {
            "0002" => Some(DeclineReason::CardDeclined),
            "0069" => Some(DeclineReason::ExpiredCard),
            _ => None,
        };

        Ok(Self { last4, decline })
    }

    #[must_use]
    pub fn last4(&self) -> &str {
        &self.last4
    }
}

/// A payment in flight (or settled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub status: PaymentStatus,
    pub started_at: DateTime<Utc>,
    pub settles_at: DateTime<Utc>,
    /// Decided at start; only revealed once settled.
    pub decline: Option<DeclineReason>,
}

impl PaymentIntent {
    /// Seconds until settlement, zero once due.
    #[must_use]
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.settles_at - now).num_seconds().max(0)
    }
}

/// Deterministic stand-in for a card processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSimulator {
    settle_after: TimeDelta,
}

impl PaymentSimulator {
    #[must_use]
    pub const fn new(settle_after: TimeDelta) -> Self {
        Self { settle_after }
    }

    #[must_use]
    pub const fn settle_after(&self) -> TimeDelta {
        self.settle_after
    }

    /// Begin a payment for `card` at `now`.
    #[must_use]
    pub fn start(&self, card: &CardDetails, now: DateTime<Utc>) -> PaymentIntent {
        PaymentIntent {
            status: PaymentStatus::Processing,
            started_at: now,
            settles_at: now + self.settle_after,
            decline: card.decline,
        }
    }

    /// Advance an intent to `now`.
    ///
    /// Settled intents are returned unchanged, so polling is idempotent.
    #[must_use]
    pub fn poll(&self, intent: &PaymentIntent, now: DateTime<Utc>) -> PaymentIntent {
        if intent.status.is_settled() || now < intent.settles_at {
            return intent.clone();
        }
        let status = if intent.decline.is_some() {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Succeeded
        };
        PaymentIntent {
            status,
            ..intent.clone()
        }
    }
}

impl Default for PaymentSimulator {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(3))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const VISA_OK: &str = "4242 4242 4242 4242";
    const DECLINED: &str = "4000 0000 0000 0002";
    const EXPIRED: &str = "4000 0000 0000 0069";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn card(number: &str) -> CardDetails {
        CardDetails::parse(number, 12, 2030, "123", today()).unwrap()
    }

    #[test]
    fn accepts_valid_card_and_keeps_last4() {
        let card = card(VISA_OK);
        assert_eq!(card.last4(), "4242");
    }

    #[test]
    fn rejects_bad_numbers() {
        assert_eq!(
            CardDetails::parse("4242", 12, 2030, "123", today()),
            Err(PaymentError::CardNumberLength)
        );
        assert_eq!(
            CardDetails::parse("4242 4242 4242 424x", 12, 2030, "123", today()),
            Err(PaymentError::CardNumberLength)
        );
        assert_eq!(
            CardDetails::parse("4242 4242 4242 4241", 12, 2030, "123", today()),
            Err(PaymentError::CardNumberChecksum)
        );
    }

    #[test]
    fn expiry_is_inclusive_of_current_month() {
        assert!(CardDetails::parse(VISA_OK, 6, 2026, "123", today()).is_ok());
        assert!(CardDetails::parse(VISA_OK, 6, 26, "123", today()).is_ok());
        assert_eq!(
            CardDetails::parse(VISA_OK, 5, 2026, "123", today()),
            Err(PaymentError::Expired)
        );
        assert_eq!(
            CardDetails::parse(VISA_OK, 13, 2026, "123", today()),
            Err(PaymentError::ExpiryMonth)
        );
    }

    #[test]
    fn rejects_bad_cvc() {
        assert_eq!(
            CardDetails::parse(VISA_OK, 12, 2030, "12", today()),
            Err(PaymentError::Cvc)
        );
        assert_eq!(
            CardDetails::parse(VISA_OK, 12, 2030, "12a", today()),
            Err(PaymentError::Cvc)
        );
    }

    #[test]
    fn poll_waits_for_settlement() {
        let sim = PaymentSimulator::new(TimeDelta::seconds(3));
        let start = DateTime::parse_from_rfc3339("2026-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let intent = sim.start(&card(VISA_OK), start);
        assert_eq!(intent.status, PaymentStatus::Processing);
        assert_eq!(intent.seconds_remaining(start), 3);

        let early = sim.poll(&intent, start + TimeDelta::seconds(2));
        assert_eq!(early.status, PaymentStatus::Processing);

        let settled = sim.poll(&intent, start + TimeDelta::seconds(3));
        assert_eq!(settled.status, PaymentStatus::Succeeded);
        assert_eq!(settled.seconds_remaining(start + TimeDelta::seconds(10)), 0);
    }

    #[test]
    fn test_cards_decline() {
        let sim = PaymentSimulator::new(TimeDelta::zero());
        let now = Utc::now();

        let declined = sim.poll(&sim.start(&card(DECLINED), now), now);
        assert_eq!(declined.status, PaymentStatus::Failed);
        assert_eq!(declined.decline, Some(DeclineReason::CardDeclined));

        let expired = sim.poll(&sim.start(&card(EXPIRED), now), now);
        assert_eq!(expired.decline, Some(DeclineReason::ExpiredCard));
    }

    #[test]
    fn settled_intent_is_not_re_evaluated() {
        let sim = PaymentSimulator::new(TimeDelta::zero());
        let now = Utc::now();
        let settled = sim.poll(&sim.start(&card(VISA_OK), now), now);
        let again = sim.poll(&settled, now + TimeDelta::hours(1));
        assert_eq!(again, settled);
    }

    #[test]
    fn decline_codes_round_trip() {
        for reason in [DeclineReason::CardDeclined, DeclineReason::ExpiredCard] {
            assert_eq!(DeclineReason::from_code(reason.as_str()), Some(reason));
        }
        assert_eq!(DeclineReason::from_code("insufficient_funds"), None);
    }
}
