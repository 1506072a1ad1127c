//! Storefront customer accounts.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use loomwear_core::{CustomerId, Email};
use serde::Deserialize;

use super::required;
use crate::db::CustomerRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::models::Customer;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list))
        .route("/api/users/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub email: String,
    pub name: String,
    pub is_active: bool,
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
) -> Result<Json<Vec<Customer>>> {
    Ok(Json(CustomerRepository::new(state.pool()).list().await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>> {
    CustomerRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

pub async fn update(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Path(id): Path<CustomerId>,
    Json(body): Json<UserRequest>,
) -> Result<Json<Customer>> {
    let email = Email::parse(&body.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let name = required(&body.name, "name")?;

    let customer = CustomerRepository::new(state.pool())
        .update(id, &email, &name, body.is_active)
        .await?;
    if !customer.is_active {
        tracing::info!(admin_id = %admin.id, customer_id = %id, "customer deactivated");
    }
    Ok(Json(customer))
}

pub async fn destroy(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Path(id): Path<CustomerId>,
) -> Result<StatusCode> {
    CustomerRepository::new(state.pool()).delete(id).await?;
    tracing::info!(admin_id = %admin.id, customer_id = %id, "customer deleted");
    Ok(StatusCode::NO_CONTENT)
}
