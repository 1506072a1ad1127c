//! Color CRUD. Hex values are stored lowercase as `#rrggbb`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use loomwear_core::ColorId;
use loomwear_core::catalog::Color;
use serde::Deserialize;

use super::{created, required};
use crate::db::ColorRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/colors", get(list).post(create))
        .route("/api/colors/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
pub struct ColorRequest {
    pub name: String,
    pub hex: String,
}

impl ColorRequest {
    fn validate(&self) -> Result<(String, String)> {
        Ok((required(&self.name, "name")?, Color::normalize_hex(&self.hex)?))
    }
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
) -> Result<Json<Vec<Color>>> {
    Ok(Json(ColorRepository::new(state.pool()).list().await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Path(id): Path<ColorId>,
) -> Result<Json<Color>> {
    ColorRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("color {id}")))
}

pub async fn create(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Json(body): Json<ColorRequest>,
) -> Result<(StatusCode, Json<Color>)> {
    let (name, hex) = body.validate()?;
    let color = ColorRepository::new(state.pool()).create(&name, &hex).await?;
    Ok(created(color))
}

pub async fn update(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<ColorId>,
    Json(body): Json<ColorRequest>,
) -> Result<Json<Color>> {
    let (name, hex) = body.validate()?;
    Ok(Json(
        ColorRepository::new(state.pool()).update(id, &name, &hex).await?,
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<ColorId>,
) -> Result<StatusCode> {
    ColorRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_normalized() {
        let request = ColorRequest {
            name: "Navy".to_owned(),
            hex: " #1F2A44 ".to_owned(),
        };
        assert_eq!(
            request.validate().unwrap(),
            ("Navy".to_owned(), "#1f2a44".to_owned())
        );
    }

    #[test]
    fn bad_hex_is_rejected() {
        let request = ColorRequest {
            name: "Navy".to_owned(),
            hex: "navy".to_owned(),
        };
        assert!(matches!(request.validate(), Err(AppError::BadRequest(_))));
    }
}
