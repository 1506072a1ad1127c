//! Products with their images, variants and stock.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use loomwear_core::catalog::{CatalogError, Product, ProductImage, ProductSummary, Variant};
use loomwear_core::{CategoryId, ColorId, ImageId, ProductId, SizeId, VariantId};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{created, optional_text, required, resolve_handle};
use crate::db::ProductRepository;
use crate::db::products::{ImageInput, ProductInput, VariantInput};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list).post(create))
        .route("/api/products/{id}", get(show).put(update).delete(destroy))
        .route("/api/products/{id}/images", post(add_image))
        .route("/api/images/{id}", delete(delete_image))
        .route("/api/products/{id}/variants", post(create_variant))
        .route("/api/variants/{id}", put(update_variant).delete(delete_variant))
        .route("/api/variants/{id}/stock", post(adjust_stock))
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<CategoryId>,
    pub q: Option<String>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub handle: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ProductRequest {
    fn into_input(self) -> Result<ProductInput> {
        let title = required(&self.title, "title")?;
        if self.price < Decimal::ZERO {
            return Err(CatalogError::NegativePrice.into());
        }
        Ok(ProductInput {
            category_id: self.category_id,
            handle: resolve_handle(self.handle.as_deref(), &title)?,
            title,
            description: self.description.trim().to_owned(),
            price: self.price,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub url: String,
    pub alt: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct VariantRequest {
    pub color_id: ColorId,
    pub size_id: SizeId,
    pub image_id: Option<ImageId>,
    pub sku: String,
    #[serde(default)]
    pub stock: i32,
}

impl VariantRequest {
    fn into_input(self) -> Result<VariantInput> {
        if self.stock < 0 {
            return Err(CatalogError::NegativeStock.into());
        }
        Ok(VariantInput {
            color_id: self.color_id,
            size_id: self.size_id,
            image_id: self.image_id,
            sku: required(&self.sku, "sku")?,
            stock: self.stock,
        })
    }
}

/// Relative stock change; the result never drops below zero.
#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub delta: i32,
}

/// A variant may only show one of its own product's images.
fn check_image(images: &[ProductImage], image_id: Option<ImageId>) -> Result<()> {
    match image_id {
        Some(id) if !images.iter().any(|image| image.id == id) => Err(AppError::BadRequest(
            format!("image {id} does not belong to this product"),
        )),
        _ => Ok(()),
    }
}

// =============================================================================
// Products
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProductSummary>>> {
    let products = ProductRepository::new(state.pool())
        .list(query.category, query.q.as_deref())
        .await?;
    Ok(Json(products))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

pub async fn create(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Json(body): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let input = body.into_input()?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;
    tracing::info!(admin_id = %admin.id, product_id = %product.id, handle = %product.handle, "product created");
    Ok(created(product))
}

pub async fn update(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Product>> {
    let input = body.into_input()?;
    Ok(Json(
        ProductRepository::new(state.pool()).update(id, &input).await?,
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete(id).await?;
    tracing::info!(admin_id = %admin.id, product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Images
// =============================================================================

pub async fn add_image(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<ProductId>,
    Json(body): Json<ImageRequest>,
) -> Result<(StatusCode, Json<ProductImage>)> {
    let input = ImageInput {
        url: required(&body.url, "url")?,
        alt: optional_text(body.alt).unwrap_or_default(),
        position: body.position,
    };
    let image = ProductRepository::new(state.pool())
        .add_image(id, &input)
        .await?;
    Ok(created(image))
}

pub async fn delete_image(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<ImageId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete_image(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Variants
// =============================================================================

pub async fn create_variant(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<ProductId>,
    Json(body): Json<VariantRequest>,
) -> Result<(StatusCode, Json<Variant>)> {
    let input = body.into_input()?;
    let repo = ProductRepository::new(state.pool());

    let product = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    check_image(&product.images, input.image_id)?;

    Ok(created(repo.create_variant(id, &input).await?))
}

pub async fn update_variant(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<VariantId>,
    Json(body): Json<VariantRequest>,
) -> Result<Json<Variant>> {
    let input = body.into_input()?;
    let repo = ProductRepository::new(state.pool());

    let variant = repo
        .variant(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("variant {id}")))?;
    if input.image_id.is_some() {
        check_image(&repo.images(variant.product_id).await?, input.image_id)?;
    }

    Ok(Json(repo.update_variant(id, &input).await?))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<VariantId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete_variant(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Path(id): Path<VariantId>,
    Json(body): Json<StockRequest>,
) -> Result<Json<Variant>> {
    let variant = ProductRepository::new(state.pool())
        .adjust_stock(id, body.delta)
        .await?;
    tracing::info!(
        admin_id = %admin.id,
        variant_id = %id,
        delta = body.delta,
        stock = variant.stock,
        "stock adjusted"
    );
    Ok(Json(variant))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product_request(price: Decimal) -> ProductRequest {
        ProductRequest {
            category_id: None,
            title: "Linen Shirt".to_owned(),
            handle: None,
            description: " Breathes. ".to_owned(),
            price,
            is_active: true,
        }
    }

    #[test]
    fn product_request_derives_handle() {
        let input = product_request(Decimal::new(4900, 2)).into_input().unwrap();
        assert_eq!(input.handle.as_str(), "linen-shirt");
        assert_eq!(input.description, "Breathes.");
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = product_request(Decimal::new(-1, 2)).into_input().unwrap_err();
        assert_eq!(err.to_string(), "Bad request: price cannot be negative");
        assert!(product_request(Decimal::ZERO).into_input().is_ok());
    }

    #[test]
    fn product_request_defaults_active() {
        let body: ProductRequest =
            serde_json::from_str(r#"{"title": "Tee", "price": "19.50"}"#).unwrap();
        assert!(body.is_active);
        assert_eq!(body.price, Decimal::new(1950, 2));
    }

    #[test]
    fn negative_stock_is_rejected() {
        let body = VariantRequest {
            color_id: ColorId::new(1),
            size_id: SizeId::new(1),
            image_id: None,
            sku: "TEE-NVY-M".to_owned(),
            stock: -1,
        };
        assert!(matches!(body.into_input(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn variant_image_must_belong_to_product() {
        let images = vec![ProductImage {
            id: ImageId::new(7),
            product_id: ProductId::new(1),
            url: "/img/tee.jpg".to_owned(),
            alt: String::new(),
            position: 0,
        }];
        assert!(check_image(&images, None).is_ok());
        assert!(check_image(&images, Some(ImageId::new(7))).is_ok());
        assert!(check_image(&images, Some(ImageId::new(8))).is_err());
    }
}
