//! Status enums for orders, payments and admin roles.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// ```text
/// PendingPayment ──► Paid ──► Shipped ──► Delivered
///       │              │
///       ├──► PaymentFailed
///       └──► Cancelled ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    Paid,
    PaymentFailed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 6] = [
        Self::PendingPayment,
        Self::Paid,
        Self::PaymentFailed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::PendingPayment,
                Self::Paid | Self::PaymentFailed | Self::Cancelled
            ) | (Self::Paid, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Whether a back-office user may move an order from `self` to `next`.
    ///
    /// Payment outcomes are only ever recorded by settlement, so staff can
    /// cancel an unpaid order but never mark it paid or failed.
    #[must_use]
    pub const fn admin_can_transition_to(self, next: Self) -> bool {
        if matches!(self, Self::PendingPayment) {
            return matches!(next, Self::Cancelled);
        }
        self.can_transition_to(next)
    }

    /// Whether the order's reserved stock should go back on the shelf when
    /// the order enters this status.
    #[must_use]
    pub const fn releases_stock(self) -> bool {
        matches!(self, Self::PaymentFailed | Self::Cancelled)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PaymentFailed | Self::Delivered | Self::Cancelled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::PaymentFailed => "payment_failed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for templates.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingPayment => "Awaiting payment",
            Self::Paid => "Paid",
            Self::PaymentFailed => "Payment failed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// State of the (simulated) payment attached to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Processing,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Processing)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admin role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "admin.admin_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access, including managing other admins.
    SuperAdmin,
    /// Full access to catalog, customers and orders.
    Admin,
    /// Read-only access.
    Viewer,
}

impl AdminRole {
    /// Whether this role may create, update or delete records.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SuperAdmin => write!(f, "super_admin"),
            Self::Admin => write!(f, "admin"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("invalid admin role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pending_payment_settles_one_way() {
        use OrderStatus::*;
        assert!(PendingPayment.can_transition_to(Paid));
        assert!(PendingPayment.can_transition_to(PaymentFailed));
        assert!(PendingPayment.can_transition_to(Cancelled));
        assert!(!PendingPayment.can_transition_to(Shipped));
        assert!(!Paid.can_transition_to(PendingPayment));
        assert!(!PaymentFailed.can_transition_to(Paid));
    }

    #[test]
    fn fulfilment_path() {
        use OrderStatus::*;
        assert!(Paid.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Shipped));
    }

    #[test]
    fn staff_cannot_settle_payments() {
        use OrderStatus::*;
        assert!(!PendingPayment.admin_can_transition_to(Paid));
        assert!(!PendingPayment.admin_can_transition_to(PaymentFailed));
        assert!(PendingPayment.admin_can_transition_to(Cancelled));
        assert!(Paid.admin_can_transition_to(Shipped));
        assert!(Paid.admin_can_transition_to(Cancelled));
        assert!(Shipped.admin_can_transition_to(Delivered));
        assert!(!Delivered.admin_can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn order_status_parses_its_own_names() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn only_failure_and_cancellation_release_stock() {
        assert!(OrderStatus::PaymentFailed.releases_stock());
        assert!(OrderStatus::Cancelled.releases_stock());
        assert!(!OrderStatus::Paid.releases_stock());
    }

    #[test]
    fn viewer_is_read_only() {
        assert!(AdminRole::SuperAdmin.can_write());
        assert!(AdminRole::Admin.can_write());
        assert!(!AdminRole::Viewer.can_write());
        assert_eq!("viewer".parse::<AdminRole>().unwrap(), AdminRole::Viewer);
    }
}
