//! Integration tests for Loomwear.
//!
//! The tests talk HTTP to running servers and use the database directly for
//! setup and for checking what the servers wrote.
//!
//! # Running Tests
//!
//! ```bash
//! lw-cli migrate
//! lw-cli seed --file seed/catalog.yaml
//! cargo run -p loomwear-storefront &
//! cargo run -p loomwear-admin &
//! cargo test -p loomwear-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - the database both servers use
//! - `STOREFRONT_URL` - default `http://localhost:3000`
//! - `ADMIN_URL` - default `http://localhost:3001`

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::time::Duration;

use loomwear_admin::services::AdminAuthService;
use loomwear_core::{AdminRole, VariantId};
use reqwest::{Client, StatusCode, redirect};
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

/// Password used for every account the tests create.
pub const TEST_PASSWORD: &str = "integration-test-password";

#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// Cookie-keeping client that reports redirects instead of following them.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Pool on `DATABASE_URL`.
pub async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    loomwear_admin::db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to database")
}

/// Unique, handle-safe name for test data.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Unique email address.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{}@loomwear.test", unique(prefix))
}

/// An active variant with at least `min_stock` units: `(id, stock)`.
pub async fn variant_in_stock(pool: &PgPool, min_stock: i32) -> Option<(VariantId, i32)> {
    sqlx::query_as::<_, (VariantId, i32)>(
        r"
        SELECT v.id, v.stock
        FROM shop.variant v
        JOIN shop.product p ON p.id = v.product_id
        WHERE p.is_active AND v.stock >= $1
        ORDER BY v.stock DESC, v.id
        LIMIT 1
        ",
    )
    .bind(min_stock)
    .fetch_optional(pool)
    .await
    .expect("Failed to query variants")
}

pub async fn stock_of(pool: &PgPool, variant: VariantId) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT stock FROM shop.variant WHERE id = $1")
        .bind(variant)
        .fetch_one(pool)
        .await
        .expect("Failed to read stock")
}

/// Create an admin account with `role` and return a client logged in as it.
pub async fn admin_client(pool: &PgPool, role: AdminRole) -> Client {
    let email = unique_email("admin");
    AdminAuthService::new(pool)
        .create_admin(&email, "Integration Test", role, TEST_PASSWORD)
        .await
        .expect("Failed to create admin");

    let client = client();
    let resp = client
        .post(format!("{}/auth/login", admin_url()))
        .form(&[("email", email.as_str()), ("password", TEST_PASSWORD)])
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/"));
    client
}

/// Register a storefront customer on `client` (which stays logged in).
pub async fn register_customer(client: &Client) -> String {
    let email = unique_email("shopper");
    let resp = client
        .post(format!("{}/auth/register", storefront_url()))
        .form(&[
            ("name", "Test Shopper"),
            ("email", email.as_str()),
            ("password", TEST_PASSWORD),
            ("password_confirm", TEST_PASSWORD),
        ])
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    email
}

/// Test cards: one that settles as paid and one that is declined.
pub const PAID_CARD: &str = "4242 4242 4242 4242";
pub const DECLINED_CARD: &str = "4000 0000 0000 0002";

/// Longer than the default `PAYMENT_SETTLE_SECS`.
pub const SETTLE_WAIT: Duration = Duration::from_secs(4);

pub async fn add_to_cart(client: &Client, variant: VariantId, quantity: u32) -> reqwest::Response {
    client
        .post(format!("{}/cart/add", storefront_url()))
        .form(&[
            ("variant_id", variant.to_string()),
            ("quantity", quantity.to_string()),
        ])
        .send()
        .await
        .expect("Failed to add to cart")
}

/// Check out the logged-in customer's cart with `card` and return the
/// order page path (`/orders/{id}`).
pub async fn place_order(client: &Client, card: &str) -> String {
    let resp = client
        .post(format!("{}/checkout", storefront_url()))
        .form(&[
            ("name", "Test Shopper"),
            ("address", "1 Loom Street\nWeaverton"),
            ("card_number", card),
            ("expiry_month", "12"),
            ("expiry_year", "2099"),
            ("cvc", "123"),
        ])
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let path = location(&resp).expect("redirect to order").to_owned();
    assert!(path.starts_with("/orders/"), "unexpected redirect: {path}");
    path
}

/// Poll an order's status fragment once and return its body.
pub async fn poll_order(client: &Client, order_path: &str) -> String {
    let resp = client
        .get(format!("{}{order_path}/status", storefront_url()))
        .send()
        .await
        .expect("Failed to poll status");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.text().await.expect("status body")
}

/// The order id at the end of an `/orders/{id}` path.
#[must_use]
pub fn order_id(order_path: &str) -> i64 {
    order_path
        .trim_start_matches("/orders/")
        .parse()
        .expect("numeric order id")
}

/// Storefront page for one variant: `/products/{handle}?color=..&size=..`.
pub async fn variant_page(pool: &PgPool, variant: VariantId) -> String {
    let (handle, color, size) = sqlx::query_as::<_, (String, i32, i32)>(
        r"
        SELECT p.handle, v.color_id, v.size_id
        FROM shop.variant v
        JOIN shop.product p ON p.id = v.product_id
        WHERE v.id = $1
        ",
    )
    .bind(variant)
    .fetch_one(pool)
    .await
    .expect("Failed to look up variant");
    format!("/products/{handle}?color={color}&size={size}")
}

pub async fn set_stock(pool: &PgPool, variant: VariantId, stock: i32) {
    sqlx::query("UPDATE shop.variant SET stock = $2 WHERE id = $1")
        .bind(variant)
        .bind(stock)
        .execute(pool)
        .await
        .expect("Failed to set stock");
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(resp: &reqwest::Response) -> Option<&str> {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}
