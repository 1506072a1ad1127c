//! Outfit CRUD and the ordered product list.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use loomwear_core::catalog::Outfit;
use loomwear_core::{OutfitId, ProductId};
use serde::Deserialize;

use super::{created, optional_text, required, resolve_handle};
use crate::db::OutfitRepository;
use crate::db::outfits::OutfitInput;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/outfits", get(list).post(create))
        .route("/api/outfits/{id}", get(show).put(update).delete(destroy))
        .route("/api/outfits/{id}/products", put(set_products))
}

#[derive(Debug, Deserialize)]
pub struct OutfitRequest {
    pub title: String,
    pub handle: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Only read on create; use `PUT /api/outfits/{id}/products` afterwards.
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
}

impl OutfitRequest {
    fn to_input(&self) -> Result<OutfitInput> {
        let title = required(&self.title, "title")?;
        Ok(OutfitInput {
            handle: resolve_handle(self.handle.as_deref(), &title)?,
            title,
            description: optional_text(self.description.clone()),
            image_url: optional_text(self.image_url.clone()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct OutfitProductsRequest {
    pub product_ids: Vec<ProductId>,
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
) -> Result<Json<Vec<Outfit>>> {
    Ok(Json(OutfitRepository::new(state.pool()).list().await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Path(id): Path<OutfitId>,
) -> Result<Json<Outfit>> {
    OutfitRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("outfit {id}")))
}

pub async fn create(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Json(body): Json<OutfitRequest>,
) -> Result<(StatusCode, Json<Outfit>)> {
    let input = body.to_input()?;
    let outfit = OutfitRepository::new(state.pool())
        .create(&input, &body.product_ids)
        .await?;
    tracing::info!(admin_id = %admin.id, outfit_id = %outfit.id, products = outfit.product_ids.len(), "outfit created");
    Ok(created(outfit))
}

pub async fn update(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<OutfitId>,
    Json(body): Json<OutfitRequest>,
) -> Result<Json<Outfit>> {
    let input = body.to_input()?;
    Ok(Json(
        OutfitRepository::new(state.pool()).update(id, &input).await?,
    ))
}

pub async fn set_products(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<OutfitId>,
    Json(body): Json<OutfitProductsRequest>,
) -> Result<Json<Outfit>> {
    Ok(Json(
        OutfitRepository::new(state.pool())
            .set_products(id, &body.product_ids)
            .await?,
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<OutfitId>,
) -> Result<StatusCode> {
    OutfitRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn product_ids_are_optional_on_create() {
        let body: OutfitRequest =
            serde_json::from_str(r#"{"title": "Weekend Linen", "image_url": ""}"#).unwrap();
        assert!(body.product_ids.is_empty());

        let input = body.to_input().unwrap();
        assert_eq!(input.handle.as_str(), "weekend-linen");
        assert_eq!(input.image_url, None);
    }
}
