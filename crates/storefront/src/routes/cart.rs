//! Cart route handlers.
//!
//! With HTMX the cart updates in place: add returns the count badge, update
//! and remove return the cart items fragment, and every mutation fires a
//! `cart-updated` event. Without JavaScript each form posts and redirects.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use loomwear_core::VariantId;
use loomwear_core::cart::{Adjustment, CartChange};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, set_flash, take_flash};
use crate::models::CurrentCustomer;
use crate::routes::is_htmx;
use crate::services::{CartContents, CartOwner};
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub variant_id: i32,
    pub handle: String,
    pub title: String,
    pub variant_label: String,
    pub quantity: u32,
    pub max_quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image_url: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&CartContents> for CartView {
    fn from(contents: &CartContents) -> Self {
        Self {
            items: contents
                .items
                .iter()
                .map(|item| CartItemView {
                    variant_id: item.detail.variant_id.as_i32(),
                    handle: item.detail.product_handle.to_string(),
                    title: item.detail.product_title.clone(),
                    variant_label: item.detail.label.clone(),
                    quantity: item.quantity,
                    max_quantity: item
                        .detail
                        .stock
                        .min(loomwear_core::cart::MAX_LINE_QUANTITY),
                    price: item.detail.price.to_string(),
                    line_price: item.line_total.to_string(),
                    image_url: item.detail.image_url.clone(),
                })
                .collect(),
            subtotal: contents.subtotal.to_string(),
            item_count: contents.item_count,
        }
    }
}

/// Describe a reconcile adjustment for the shopper.
///
/// Clamped lines are still in the cart, so their title is known; dropped
/// lines may refer to variants that no longer exist.
#[must_use]
pub fn adjustment_notice(adjustment: &Adjustment, contents: &CartContents) -> String {
    match adjustment {
        Adjustment::Clamped {
            variant_id, kept, ..
        } => {
            let title = contents
                .items
                .iter()
                .find(|i| i.detail.variant_id == *variant_id)
                .map_or("An item", |i| i.detail.product_title.as_str());
            format!("{title}: only {kept} available, quantity reduced.")
        }
        Adjustment::Dropped { .. } => {
            "An item in your cart is no longer available and was removed.".to_owned()
        }
    }
}

/// Tell the shopper when an add kept fewer units than they asked for.
#[must_use]
pub fn clamp_notice(change: &CartChange) -> Option<String> {
    change.clamped.then(|| {
        format!(
            "Only {} of this item can be in your cart, so that is what you have.",
            change.quantity
        )
    })
}

/// Notices for a cart page: the pending flash, then any adjustments.
#[must_use]
pub fn cart_notices(flash: Option<String>, contents: &CartContents) -> Vec<String> {
    flash
        .into_iter()
        .chain(
            contents
                .adjustments
                .iter()
                .map(|a| adjustment_notice(a, contents)),
        )
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub variant_id: i32,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub variant_id: i32,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub variant_id: i32,
}

#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
    pub notices: Vec<String>,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Cart items fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub notices: Vec<String>,
    pub logged_in: bool,
}

/// Cart count badge fragment (for HTMX).
///
/// A notice is swapped out-of-band into the page's `#cart-notice` slot.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
    pub notice: Option<String>,
}

/// Display the cart page.
#[instrument(skip(state, session, customer, nonce))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<CartShowTemplate> {
    let contents = state.cart(&session).contents().await?;
    let notices = cart_notices(take_flash(&session).await, &contents);

    Ok(CartShowTemplate {
        cart: CartView::from(&contents),
        notices,
        customer,
        nonce,
    })
}

/// The cart items fragment, freshly reconciled.
async fn items_fragment(state: &AppState, session: &Session) -> Result<Response> {
    let cart = state.cart(session);
    let contents = cart.contents().await?;
    let logged_in = cart.owner().await? != CartOwner::Guest;

    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate {
            cart: CartView::from(&contents),
            notices: cart_notices(None, &contents),
            logged_in,
        },
    )
        .into_response())
}

/// Add a variant to the cart.
///
/// Asking for more than is available keeps what fits and says so.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let variant = VariantId::new(form.variant_id);
    let (cart, change) = state
        .cart(&session)
        .add(variant, form.quantity.unwrap_or(1))
        .await?;
    let notice = clamp_notice(&change);

    let variant_id = variant.to_string();
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("variant_id", variant_id.as_str())]),
    );

    if is_htmx(&headers) {
        Ok((
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.item_count(),
                notice,
            },
        )
            .into_response())
    } else {
        if let Some(notice) = notice {
            set_flash(&session, notice).await?;
        }
        Ok(Redirect::to("/cart").into_response())
    }
}

/// Set a line's quantity (0 removes it).
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    state
        .cart(&session)
        .update(VariantId::new(form.variant_id), form.quantity)
        .await?;

    if is_htmx(&headers) {
        items_fragment(&state, &session).await
    } else {
        Ok(Redirect::to("/cart").into_response())
    }
}

/// Remove a line. Removing something not in the cart is not an error.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    state
        .cart(&session)
        .remove(VariantId::new(form.variant_id))
        .await?;

    if is_htmx(&headers) {
        items_fragment(&state, &session).await
    } else {
        Ok(Redirect::to("/cart").into_response())
    }
}

/// Cart count badge.
pub async fn count(State(state): State<AppState>, session: Session) -> Result<CartCountTemplate> {
    let count = state.cart(&session).count().await?;
    Ok(CartCountTemplate {
        count,
        notice: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loomwear_core::{Handle, Money, ProductId};

    use super::*;
    use crate::db::VariantDetail;
    use crate::db::catalog::STORE_CURRENCY;
    use crate::services::cart::CartItem;

    fn contents(adjustments: Vec<Adjustment>) -> CartContents {
        let detail = VariantDetail {
            variant_id: VariantId::new(4),
            product_id: ProductId::new(1),
            product_title: "Wool Coat".to_owned(),
            product_handle: Handle::parse("wool-coat").unwrap(),
            label: "Navy / L".to_owned(),
            sku: "WC-NV-L".to_owned(),
            stock: 25,
            price: Money::from_cents(18_000, STORE_CURRENCY),
            image_url: Some("https://img.example/coat.jpg".to_owned()),
            is_active: true,
        };
        CartContents {
            items: vec![CartItem {
                detail,
                quantity: 2,
                line_total: Money::from_cents(36_000, STORE_CURRENCY),
            }],
            subtotal: Money::from_cents(36_000, STORE_CURRENCY),
            item_count: 2,
            adjustments,
        }
    }

    #[test]
    fn cart_view_formats_money_and_caps_quantity() {
        let view = CartView::from(&contents(Vec::new()));
        assert_eq!(view.subtotal, "$360.00");
        assert_eq!(view.item_count, 2);
        let item = view.items.first().unwrap();
        assert_eq!(item.handle, "wool-coat");
        assert_eq!(item.line_price, "$360.00");
        assert_eq!(item.max_quantity, loomwear_core::cart::MAX_LINE_QUANTITY);
    }

    #[test]
    fn clamped_adds_produce_a_notice() {
        let change = CartChange {
            variant_id: VariantId::new(4),
            quantity: 3,
            clamped: true,
        };
        let notice = clamp_notice(&change).unwrap();
        assert!(notice.starts_with("Only 3 of this item"));

        let exact = CartChange {
            clamped: false,
            ..change
        };
        assert_eq!(clamp_notice(&exact), None);
    }

    #[test]
    fn count_fragment_swaps_notice_out_of_band() {
        let html = CartCountTemplate {
            count: 3,
            notice: Some("Only 3 left".to_owned()),
        }
        .render()
        .unwrap();
        assert!(html.starts_with('3'));
        assert!(html.contains(r#"id="cart-notice""#));
        assert!(html.contains(r#"hx-swap-oob="true""#));
        assert!(html.contains("Only 3 left"));

        let plain = CartCountTemplate {
            count: 2,
            notice: None,
        }
        .render()
        .unwrap();
        assert_eq!(plain.trim(), "2");
    }

    #[test]
    fn notices_name_clamped_products() {
        let contents = contents(vec![
            Adjustment::Clamped {
                variant_id: VariantId::new(4),
                requested: 5,
                kept: 2,
            },
            Adjustment::Dropped {
                variant_id: VariantId::new(9),
            },
        ]);

        let notices = cart_notices(Some("Welcome back".to_owned()), &contents);
        assert_eq!(
            notices,
            vec![
                "Welcome back".to_owned(),
                "Wool Coat: only 2 available, quantity reduced.".to_owned(),
                "An item in your cart is no longer available and was removed.".to_owned(),
            ]
        );
    }
}
