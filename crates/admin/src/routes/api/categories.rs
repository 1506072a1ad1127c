//! Category CRUD.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use loomwear_core::CategoryId;
use loomwear_core::catalog::Category;
use serde::Deserialize;

use super::{created, optional_text, required, resolve_handle};
use crate::db::CategoryRepository;
use crate::db::categories::CategoryInput;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route(
            "/api/categories/{id}",
            get(show).put(update).delete(destroy),
        )
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub handle: Option<String>,
    pub description: Option<String>,
}

impl CategoryRequest {
    fn into_input(self) -> Result<CategoryInput> {
        let name = required(&self.name, "name")?;
        let handle = resolve_handle(self.handle.as_deref(), &name)?;
        Ok(CategoryInput {
            name,
            handle,
            description: optional_text(self.description),
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list().await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Path(id): Path<CategoryId>,
) -> Result<Json<Category>> {
    CategoryRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))
}

pub async fn create(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let input = body.into_input()?;
    let category = CategoryRepository::new(state.pool()).create(&input).await?;
    tracing::info!(admin_id = %admin.id, category_id = %category.id, "category created");
    Ok(created(category))
}

pub async fn update(
    State(state): State<AppState>,
    RequireWriteAccess(_): RequireWriteAccess,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    let input = body.into_input()?;
    Ok(Json(
        CategoryRepository::new(state.pool()).update(id, &input).await?,
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    tracing::info!(admin_id = %admin.id, category_id = %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn request_derives_handle_and_drops_blank_description() {
        let input = CategoryRequest {
            name: " Knitwear ".to_owned(),
            handle: None,
            description: Some(String::new()),
        }
        .into_input()
        .unwrap();
        assert_eq!(input.name, "Knitwear");
        assert_eq!(input.handle.as_str(), "knitwear");
        assert_eq!(input.description, None);
    }
}
