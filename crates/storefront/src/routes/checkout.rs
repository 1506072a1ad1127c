//! Checkout route handlers.
//!
//! Checkout needs a logged-in customer; a guest cart has already been merged
//! into their saved cart at login.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use loomwear_core::payment::{CardDetails, PaymentError};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth, set_flash};
use crate::models::CurrentCustomer;
use crate::routes::cart::{CartView, cart_notices};
use crate::services::CheckoutError;
use crate::services::checkout::validate_shipping;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    pub name: String,
    pub address: String,
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvc: String,
}

/// Shipping fields echoed back after a failed attempt. Card fields never are.
#[derive(Clone, Default)]
pub struct ShippingFormView {
    pub name: String,
    pub address: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub cart: CartView,
    pub notices: Vec<String>,
    pub error: Option<String>,
    pub shipping: ShippingFormView,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Validate card input. Expiry fields must be numbers.
///
/// # Errors
///
/// Returns a message for the shopper.
pub fn parse_card(
    form: &CheckoutForm,
    today: NaiveDate,
) -> std::result::Result<CardDetails, String> {
    let month = form
        .expiry_month
        .trim()
        .parse::<u32>()
        .map_err(|_| PaymentError::ExpiryMonth.to_string())?;
    let year = form
        .expiry_year
        .trim()
        .parse::<i32>()
        .map_err(|_| "expiry year must be a number".to_owned())?;
    CardDetails::parse(&form.card_number, month, year, &form.cvc, today)
        .map_err(|e| e.to_string())
}

/// Render the checkout page for `customer`.
async fn render(
    state: &AppState,
    customer: CurrentCustomer,
    nonce: String,
    error: Option<String>,
    shipping: ShippingFormView,
) -> Result<Response> {
    let contents = state.checkout().review(customer.id).await?;
    if contents.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let status = if error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let template = CheckoutTemplate {
        cart: CartView::from(&contents),
        notices: cart_notices(None, &contents),
        error,
        shipping,
        customer: Some(customer),
        nonce,
    };
    Ok((status, template).into_response())
}

/// Display the order summary and payment form.
#[instrument(skip_all, fields(customer_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    CspNonce(nonce): CspNonce,
) -> Result<Response> {
    let shipping = ShippingFormView {
        name: customer.name.clone(),
        address: String::new(),
    };
    render(&state, customer, nonce, None, shipping).await
}

/// Place the order and go to its status page.
///
/// Input problems re-render the form; stock changes send the shopper back
/// to review the cart.
#[instrument(skip_all, fields(customer_id = %customer.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    CspNonce(nonce): CspNonce,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let echoed = ShippingFormView {
        name: form.name.clone(),
        address: form.address.clone(),
    };

    let shipping = match validate_shipping(&form.name, &form.address) {
        Ok(shipping) => shipping,
        Err(e) => return render(&state, customer, nonce, Some(e.to_string()), echoed).await,
    };

    let now = Utc::now();
    let card = match parse_card(&form, now.date_naive()) {
        Ok(card) => card,
        Err(message) => return render(&state, customer, nonce, Some(message), echoed).await,
    };

    match state
        .checkout()
        .place_order(customer.id, shipping, &card, now)
        .await
    {
        Ok(order_id) => {
            let id = order_id.to_string();
            add_breadcrumb("checkout", "Order placed", Some(&[("order_id", id.as_str())]));
            Ok(Redirect::to(&format!("/orders/{order_id}")).into_response())
        }
        Err(CheckoutError::EmptyCart) => Ok(Redirect::to("/cart").into_response()),
        Err(CheckoutError::CartChanged(_)) => {
            set_flash(
                &session,
                "Some items in your cart changed while you were checking out. Please review your cart.",
            )
            .await?;
            Ok(Redirect::to("/cart").into_response())
        }
        Err(CheckoutError::InsufficientStock { .. }) => {
            let message = "An item sold out while your order was being placed. \
                           Your cart has been updated; please review it."
                .to_owned();
            render(&state, customer, nonce, Some(message), echoed).await
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(number: &str, month: &str, year: &str) -> CheckoutForm {
        CheckoutForm {
            name: "Ada".to_owned(),
            address: "12 Loom St".to_owned(),
            card_number: number.to_owned(),
            expiry_month: month.to_owned(),
            expiry_year: year.to_owned(),
            cvc: "123".to_owned(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn valid_card_keeps_last_four() {
        let card = parse_card(&form("4242 4242 4242 4242", "12", "28"), today()).unwrap();
        assert_eq!(card.last4(), "4242");
    }

    #[test]
    fn non_numeric_expiry_is_a_message() {
        let err = parse_card(&form("4242424242424242", "Dec", "2028"), today()).unwrap_err();
        assert_eq!(err, PaymentError::ExpiryMonth.to_string());
        let err = parse_card(&form("4242424242424242", "12", "soon"), today()).unwrap_err();
        assert_eq!(err, "expiry year must be a number");
    }

    #[test]
    fn card_errors_are_shown_as_text() {
        let err = parse_card(&form("4242424242424241", "12", "2028"), today()).unwrap_err();
        assert_eq!(err, PaymentError::CardNumberChecksum.to_string());
        let err = parse_card(&form("4242424242424242", "9", "2026"), today()).unwrap_err();
        assert_eq!(err, PaymentError::Expired.to_string());
    }
}
