//! Integration tests for the storefront cart, login merge and checkout.
//!
//! These tests require:
//! - A migrated and seeded database on `DATABASE_URL`
//! - The storefront server running (cargo run -p loomwear-storefront)
//!
//! Run with: cargo test -p loomwear-integration-tests -- --ignored

use loomwear_core::cart::MAX_LINE_QUANTITY;
use loomwear_integration_tests::{
    DECLINED_CARD, PAID_CARD, SETTLE_WAIT, TEST_PASSWORD, add_to_cart, client, location,
    place_order, poll_order, pool, register_customer, set_stock, stock_of, storefront_url,
    variant_in_stock, variant_page,
};
use reqwest::{Client, StatusCode};

async fn cart_count(client: &Client) -> String {
    client
        .get(format!("{}/cart/count", storefront_url()))
        .send()
        .await
        .expect("Failed to get cart count")
        .text()
        .await
        .expect("Failed to read cart count")
        .trim()
        .to_owned()
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_health() {
    let resp = client()
        .get(format!("{}/health", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_cart_add_redirects_without_htmx() {
    let pool = pool().await;
    let (variant, _) = variant_in_stock(&pool, 2).await.expect("seed a variant with stock");
    let client = client();

    let resp = add_to_cart(&client, variant, 2).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/cart"));
    assert_eq!(cart_count(&client).await, "2");
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_htmx_add_returns_fragment_and_trigger() {
    let pool = pool().await;
    let (variant, _) = variant_in_stock(&pool, 1).await.expect("seed a variant with stock");
    let client = client();

    let resp = client
        .post(format!("{}/cart/add", storefront_url()))
        .header("HX-Request", "true")
        .form(&[("variant_id", variant.to_string())])
        .send()
        .await
        .expect("Failed to add to cart");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("hx-trigger").and_then(|v| v.to_str().ok()),
        Some("cart-updated")
    );
    assert_eq!(resp.text().await.expect("body").trim(), "1");
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_quantity_is_capped() {
    let pool = pool().await;
    let (variant, stock) = variant_in_stock(&pool, 1).await.expect("seed a variant with stock");
    let client = client();

    let stock = u32::try_from(stock).expect("stock is non-negative");
    add_to_cart(&client, variant, stock + MAX_LINE_QUANTITY).await;

    let expected = stock.min(MAX_LINE_QUANTITY);
    assert_eq!(cart_count(&client).await, expected.to_string());

    let body = client
        .get(format!("{}/cart", storefront_url()))
        .send()
        .await
        .expect("Failed to get cart")
        .text()
        .await
        .expect("body");
    assert!(
        body.contains(&format!("Only {expected} of this item")),
        "missing clamp notice: {body}"
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_guest_cart_merges_into_account_on_login() {
    let pool = pool().await;
    let (variant, _) = variant_in_stock(&pool, 3).await.expect("seed a variant with stock");

    // An account with one unit saved in its cart
    let first = client();
    let email = register_customer(&first).await;
    add_to_cart(&first, variant, 1).await;

    // A guest session adds two more, then logs in
    let guest = client();
    add_to_cart(&guest, variant, 2).await;
    let resp = guest
        .post(format!("{}/auth/login", storefront_url()))
        .form(&[("email", email.as_str()), ("password", TEST_PASSWORD)])
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    assert_eq!(cart_count(&guest).await, "3");
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_checkout_requires_login() {
    let resp = client()
        .get(format!("{}/checkout", storefront_url()))
        .send()
        .await
        .expect("Failed to get checkout");

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).is_some_and(|l| l.starts_with("/auth/login")));
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_checkout_reserves_stock_and_settles() {
    let pool = pool().await;
    let (variant, _) = variant_in_stock(&pool, 1).await.expect("seed a variant with stock");
    let client = client();
    register_customer(&client).await;
    add_to_cart(&client, variant, 1).await;
    let before = stock_of(&pool, variant).await;

    let order_path = place_order(&client, PAID_CARD).await;
    assert_eq!(stock_of(&pool, variant).await, before - 1);
    assert_eq!(cart_count(&client).await, "");

    tokio::time::sleep(SETTLE_WAIT).await;
    let body = poll_order(&client, &order_path).await;
    assert!(body.contains("Paid"), "unexpected status fragment: {body}");
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_declined_card_restocks_once_across_polls() {
    let pool = pool().await;
    let (variant, _) = variant_in_stock(&pool, 1).await.expect("seed a variant with stock");
    let client = client();
    register_customer(&client).await;
    add_to_cart(&client, variant, 1).await;
    let before = stock_of(&pool, variant).await;

    let order_path = place_order(&client, DECLINED_CARD).await;
    assert_eq!(stock_of(&pool, variant).await, before - 1);

    tokio::time::sleep(SETTLE_WAIT).await;
    let body = poll_order(&client, &order_path).await;
    assert!(body.contains("Payment failed"), "unexpected status fragment: {body}");
    assert_eq!(stock_of(&pool, variant).await, before);

    // Later polls see the settled order and leave stock alone
    let (second, third) = tokio::join!(
        poll_order(&client, &order_path),
        poll_order(&client, &order_path)
    );
    assert!(second.contains("Payment failed"));
    assert!(third.contains("Payment failed"));
    assert_eq!(stock_of(&pool, variant).await, before);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_declined_payment_reopens_sold_out_product_page() {
    let pool = pool().await;
    let (variant, original) = variant_in_stock(&pool, 1).await.expect("seed a variant with stock");
    let page = format!("{}{}", storefront_url(), variant_page(&pool, variant).await);
    set_stock(&pool, variant, 1).await;

    let client = client();
    register_customer(&client).await;
    add_to_cart(&client, variant, 1).await;
    let order_path = place_order(&client, DECLINED_CARD).await;

    // Rendering the page now caches it as sold out
    let body = client.get(&page).send().await.expect("product page").text().await.expect("body");
    assert!(body.contains("Sold out in this color and size"), "expected sold out: {body}");

    tokio::time::sleep(SETTLE_WAIT).await;
    poll_order(&client, &order_path).await;

    let body = client.get(&page).send().await.expect("product page").text().await.expect("body");
    assert!(body.contains("Add to cart"), "expected purchasable again: {body}");

    set_stock(&pool, variant, original).await;
}
