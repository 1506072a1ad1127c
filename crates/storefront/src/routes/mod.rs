//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                        - Home page
//!
//! # Catalog (cached)
//! GET  /collections             - Category list
//! GET  /collections/{handle}    - Category products (?color=&size=&sort=&in_stock=)
//! GET  /products/{handle}       - Product detail with variant picker (?color=&size=)
//! GET  /outfits                 - Outfit list
//! GET  /outfits/{handle}        - Outfit detail
//! GET  /search?q=               - Product search (uncached)
//!
//! # Cart (HTMX fragments, plain redirects without JS)
//! GET  /cart                    - Cart page
//! POST /cart/add                - Add to cart (count fragment + HX-Trigger)
//! POST /cart/update             - Update quantity (cart items fragment)
//! POST /cart/remove             - Remove line (cart items fragment)
//! GET  /cart/count              - Cart count badge
//!
//! # Checkout and orders (requires auth)
//! GET  /checkout                - Order summary and payment form
//! POST /checkout                - Place order
//! GET  /orders/{id}             - Order page
//! GET  /orders/{id}/status      - Polled payment status fragment
//!
//! # Auth
//! GET  /auth/login              - Login page
//! POST /auth/login              - Login action
//! GET  /auth/register           - Register page
//! POST /auth/register           - Register action
//! POST /auth/logout             - Logout action
//!
//! # Account (requires auth)
//! GET  /account                 - Profile and order history
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod collections;
pub mod home;
pub mod orders;
pub mod outfits;
pub mod products;
pub mod search;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, cart_rate_limiter};
use crate::state::AppState;

/// Whether the request was made by HTMX (and wants a fragment back).
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// A post-login redirect target, only if it stays on this site.
#[must_use]
pub fn local_redirect(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

/// Parse an optional numeric query value; blank or junk means "not set".
#[must_use]
pub fn query_id(value: Option<&str>) -> Option<i32> {
    value.and_then(|v| v.trim().parse().ok())
}

pub fn auth_routes() -> Router<AppState> {
    let actions = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .merge(actions)
}

pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .layer(cart_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/collections", get(collections::index))
        .route("/collections/{handle}", get(collections::show))
        .route("/products/{handle}", get(products::show))
        .route("/outfits", get(outfits::index))
        .route("/outfits/{handle}", get(outfits::show))
        .route("/search", get(search::search))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", get(checkout::show).post(checkout::place))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", get(orders::status))
}

/// Create all page routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .merge(order_routes())
        .nest("/auth", auth_routes())
        .route("/account", get(account::index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_redirect_targets() {
        assert_eq!(local_redirect(Some("/checkout")), Some("/checkout"));
        assert_eq!(local_redirect(Some("//evil.example")), None);
        assert_eq!(local_redirect(Some("https://evil.example")), None);
        assert_eq!(local_redirect(Some("/\\evil.example")), None);
        assert_eq!(local_redirect(None), None);
    }

    #[test]
    fn query_ids_ignore_blank_values() {
        assert_eq!(query_id(Some("12")), Some(12));
        assert_eq!(query_id(Some("")), None);
        assert_eq!(query_id(Some("red")), None);
        assert_eq!(query_id(None), None);
    }

    #[test]
    fn htmx_requests_are_detected() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("hx-request", axum::http::HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
    }
}
