//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use loomwear_core::order::OrderSummary;

use crate::db::{CustomerRepository, OrderRepository};
use crate::error::{Result, clear_sentry_user};
use crate::filters;
use crate::middleware::auth::login_url;
use crate::middleware::{CspNonce, RequireAuth, take_flash};
use crate::models::CurrentCustomer;
use crate::state::AppState;

/// Profile display data for templates.
#[derive(Clone)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub member_since: String,
}

/// Order history row.
#[derive(Clone)]
pub struct OrderSummaryView {
    pub id: i32,
    pub placed_at: String,
    pub status: &'static str,
    pub label: &'static str,
    pub item_count: i64,
    pub subtotal: String,
}

impl From<&OrderSummary> for OrderSummaryView {
    fn from(order: &OrderSummary) -> Self {
        Self {
            id: order.id.as_i32(),
            placed_at: order.created_at.format("%b %-d, %Y").to_string(),
            status: order.status.as_str(),
            label: order.status.label(),
            item_count: order.item_count,
            subtotal: order.subtotal.to_string(),
        }
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub profile: ProfileView,
    pub orders: Vec<OrderSummaryView>,
    pub flash: Option<String>,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Display account overview page.
///
/// A session whose customer no longer exists is cleared.
#[instrument(skip_all, fields(customer_id = %current.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    CspNonce(nonce): CspNonce,
) -> Result<Response> {
    let Some(customer) = CustomerRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
    else {
        tracing::warn!("session refers to a missing customer");
        session.flush().await?;
        clear_sentry_user();
        return Ok(Redirect::to(&login_url("/account")).into_response());
    };

    let orders = OrderRepository::new(state.pool())
        .list_for_customer(customer.id)
        .await?;

    Ok(AccountIndexTemplate {
        profile: ProfileView {
            name: customer.name.clone(),
            email: customer.email.to_string(),
            member_since: customer.created_at.format("%B %Y").to_string(),
        },
        orders: orders.iter().map(OrderSummaryView::from).collect(),
        flash: take_flash(&session).await,
        customer: Some(current),
        nonce,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use loomwear_core::{CurrencyCode, CustomerId, Money, OrderId, OrderStatus};

    use super::*;

    #[test]
    fn summaries_show_status_and_totals() {
        let summary = OrderSummary {
            id: OrderId::new(7),
            customer_id: CustomerId::new(1),
            status: OrderStatus::Shipped,
            subtotal: Money::from_cents(12_500, CurrencyCode::USD),
            item_count: 3,
            created_at: Utc.with_ymd_and_hms(2026, 1, 9, 8, 30, 0).unwrap(),
        };

        let view = OrderSummaryView::from(&summary);
        assert_eq!(view.id, 7);
        assert_eq!(view.placed_at, "Jan 9, 2026");
        assert_eq!(view.status, "shipped");
        assert_eq!(view.label, "Shipped");
        assert_eq!(view.subtotal, "$125.00");
    }
}
