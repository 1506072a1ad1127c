//! Size CRUD.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use loomwear_core::SizeId;
use loomwear_core::catalog::Size;
use serde::Deserialize;

use super::{created, required};
use crate::db::SizeRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sizes", get(list).post(create))
        .route("/api/sizes/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
pub struct SizeRequest {
    pub label: String,
    /// Position in size pickers, smallest first.
    #[serde(default)]
    pub sort_order: i32,
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
) -> Result<Json<Vec<Size>>> {
    Ok(Json(SizeRepository::new(state.pool()).list().await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Path(id): Path<SizeId>,
) -> Result<Json<Size>> {
    SizeRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("size {id}")))
}

pub async fn create(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Json(body): Json<SizeRequest>,
) -> Result<(StatusCode, Json<Size>)> {
    let label = required(&body.label, "label")?;
    let size = SizeRepository::new(state.pool())
        .create(&label, body.sort_order)
        .await?;
    Ok(created(size))
}

pub async fn update(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<SizeId>,
    Json(body): Json<SizeRequest>,
) -> Result<Json<Size>> {
    let label = required(&body.label, "label")?;
    Ok(Json(
        SizeRepository::new(state.pool())
            .update(id, &label, body.sort_order)
            .await?,
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<SizeId>,
) -> Result<StatusCode> {
    SizeRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
