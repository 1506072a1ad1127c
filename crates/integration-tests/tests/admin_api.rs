//! Integration tests for the admin JSON API.
//!
//! These tests require:
//! - A migrated database on `DATABASE_URL`
//! - The admin server running (cargo run -p loomwear-admin)
//! - For the order tests, the storefront too (cargo run -p loomwear-storefront)
//!
//! Run with: cargo test -p loomwear-integration-tests -- --ignored

use loomwear_core::AdminRole;
use loomwear_integration_tests::{
    PAID_CARD, SETTLE_WAIT, add_to_cart, admin_client, admin_url, client, order_id, place_order,
    poll_order, pool, register_customer, stock_of, unique, variant_in_stock,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn post_json(client: &Client, path: &str, body: &Value) -> reqwest::Response {
    client
        .post(format!("{}{path}", admin_url()))
        .json(body)
        .send()
        .await
        .expect("Failed to send request")
}

async fn created_id(resp: reqwest::Response) -> i64 {
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("json body");
    body["id"].as_i64().expect("id")
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_api_requires_login() {
    let resp = client()
        .get(format!("{}/api/products", admin_url()))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client()
        .get(format!("{}/", admin_url()))
        .send()
        .await
        .expect("Failed to reach admin");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_viewer_can_read_but_not_write() {
    let pool = pool().await;
    let viewer = admin_client(&pool, AdminRole::Viewer).await;

    let resp = viewer
        .get(format!("{}/api/colors", admin_url()))
        .send()
        .await
        .expect("Failed to list colors");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = post_json(&viewer, "/api/colors", &json!({"name": unique("c"), "hex": "#112233"})).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_duplicate_color_name_conflicts() {
    let pool = pool().await;
    let admin = admin_client(&pool, AdminRole::Admin).await;
    let name = unique("color");

    let resp = post_json(&admin, "/api/colors", &json!({"name": name, "hex": "#ABCDEF"})).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["hex"], "#abcdef");

    let resp = post_json(&admin, "/api/colors", &json!({"name": name, "hex": "#000000"})).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_product_lifecycle_with_variants_and_stock() {
    let pool = pool().await;
    let admin = admin_client(&pool, AdminRole::Admin).await;
    let base = admin_url();

    let category = created_id(post_json(&admin, "/api/categories", &json!({"name": unique("Cat")})).await).await;
    let color = created_id(post_json(&admin, "/api/colors", &json!({"name": unique("Navy"), "hex": "#1f2a44"})).await).await;
    let size = created_id(post_json(&admin, "/api/sizes", &json!({"label": unique("M")})).await).await;

    // Negative prices are refused
    let resp = post_json(
        &admin,
        "/api/products",
        &json!({"title": unique("Bad"), "price": "-1.00", "category_id": category}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let title = unique("Linen Shirt");
    let resp = post_json(
        &admin,
        "/api/products",
        &json!({"title": title, "price": "49.00", "category_id": category}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product: Value = resp.json().await.expect("json body");
    let product_id = product["id"].as_i64().expect("id");
    assert_eq!(product["handle"], title.to_lowercase().replace(' ', "-"));

    let image = created_id(post_json(&admin, &format!("/api/products/{product_id}/images"), &json!({"url": "/static/img/test.jpg"})).await).await;

    let sku = unique("SKU");
    let variant = created_id(
        post_json(
            &admin,
            &format!("/api/products/{product_id}/variants"),
            &json!({"color_id": color, "size_id": size, "image_id": image, "sku": sku, "stock": 3}),
        )
        .await,
    )
    .await;

    // Same color × size again conflicts
    let resp = post_json(
        &admin,
        &format!("/api/products/{product_id}/variants"),
        &json!({"color_id": color, "size_id": size, "sku": unique("SKU")}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Stock never goes below zero
    let resp = post_json(&admin, &format!("/api/variants/{variant}/stock"), &json!({"delta": -10})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["stock"], 0);

    // The category and color are in use
    let resp = admin
        .delete(format!("{base}/api/categories/{category}"))
        .send()
        .await
        .expect("delete category");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = admin
        .delete(format!("{base}/api/colors/{color}"))
        .send()
        .await
        .expect("delete color");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Deleting the product frees them
    let resp = admin
        .delete(format!("{base}/api/products/{product_id}"))
        .send()
        .await
        .expect("delete product");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = admin
        .delete(format!("{base}/api/categories/{category}"))
        .send()
        .await
        .expect("delete category");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_outfit_products_keep_order() {
    let pool = pool().await;
    let admin = admin_client(&pool, AdminRole::Admin).await;

    let mut products = Vec::new();
    for _ in 0..3 {
        let id = created_id(
            post_json(&admin, "/api/products", &json!({"title": unique("Piece"), "price": "10.00"})).await,
        )
        .await;
        products.push(id);
    }

    let outfit = created_id(post_json(&admin, "/api/outfits", &json!({"title": unique("Outfit"), "product_ids": products})).await).await;

    let reversed: Vec<i64> = products.iter().rev().copied().collect();
    let resp = admin
        .put(format!("{}/api/outfits/{outfit}/products", admin_url()))
        .json(&json!({"product_ids": reversed}))
        .send()
        .await
        .expect("set outfit products");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["product_ids"], json!(reversed));
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_unknown_order_status_filter_is_rejected() {
    let pool = pool().await;
    let admin = admin_client(&pool, AdminRole::Viewer).await;

    let resp = admin
        .get(format!("{}/api/orders?status=lost", admin_url()))
        .send()
        .await
        .expect("list orders");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = admin
        .get(format!("{}/api/orders?status=paid", admin_url()))
        .send()
        .await
        .expect("list orders");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers and database"]
async fn test_unpaid_orders_can_only_be_cancelled() {
    let pool = pool().await;
    let admin = admin_client(&pool, AdminRole::Admin).await;
    let (variant, _) = variant_in_stock(&pool, 1).await.expect("seed a variant with stock");
    let shopper = client();
    register_customer(&shopper).await;
    add_to_cart(&shopper, variant, 1).await;
    let before = stock_of(&pool, variant).await;
    let id = order_id(&place_order(&shopper, PAID_CARD).await);
    let path = format!("/api/orders/{id}/status");

    for status in ["paid", "payment_failed"] {
        let resp = post_json(&admin, &path, &json!({"status": status})).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT, "{status}");
    }

    let resp = post_json(&admin, &path, &json!({"status": "cancelled"})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = resp.json().await.expect("json body");
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["payment"]["status"], "failed");
    assert_eq!(stock_of(&pool, variant).await, before);
}

#[tokio::test]
#[ignore = "Requires running admin and storefront servers and database"]
async fn test_cancelling_paid_order_restocks_once() {
    let pool = pool().await;
    let admin = admin_client(&pool, AdminRole::Admin).await;
    let (variant, _) = variant_in_stock(&pool, 2).await.expect("seed a variant with stock");
    let shopper = client();
    register_customer(&shopper).await;
    add_to_cart(&shopper, variant, 2).await;
    let before = stock_of(&pool, variant).await;

    let order_path = place_order(&shopper, PAID_CARD).await;
    tokio::time::sleep(SETTLE_WAIT).await;
    let body = poll_order(&shopper, &order_path).await;
    assert!(body.contains("Paid"), "unexpected status fragment: {body}");
    assert_eq!(stock_of(&pool, variant).await, before - 2);

    let path = format!("/api/orders/{}/status", order_id(&order_path));
    let resp = post_json(&admin, &path, &json!({"status": "cancelled"})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(stock_of(&pool, variant).await, before);

    let resp = post_json(&admin, &path, &json!({"status": "cancelled"})).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(stock_of(&pool, variant).await, before);
}
