//! Order review and status changes.

use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use loomwear_core::order::{Order, OrderSummary};
use loomwear_core::{OrderId, OrderStatus};
use serde::Deserialize;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list))
        .route("/api/orders/{id}", get(show))
        .route("/api/orders/{id}/status", post(change_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// Blank means no filter.
fn status_filter(raw: Option<&str>) -> Result<Option<OrderStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => OrderStatus::from_str(raw)
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("unknown order status: {raw}"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderSummary>>> {
    let status = status_filter(query.status.as_deref())?;
    Ok(Json(OrderRepository::new(state.pool()).list(status).await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_): RequireAdminAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Cancelling puts the order's units back in stock.
pub async fn change_status(
    State(state): State<AppState>,
    RequireWriteAccess(admin): RequireWriteAccess,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .change_status(id, body.status)
        .await?;
    tracing::info!(admin_id = %admin.id, order_id = %id, status = %order.status, "order status changed");
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_parses_snake_case() {
        assert_eq!(status_filter(None).unwrap(), None);
        assert_eq!(status_filter(Some("")).unwrap(), None);
        assert_eq!(
            status_filter(Some("shipped")).unwrap(),
            Some(OrderStatus::Shipped)
        );
        assert!(matches!(
            status_filter(Some("lost")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn status_body_uses_snake_case() {
        let body: StatusRequest = serde_json::from_str(r#"{"status": "cancelled"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Cancelled);
    }
}
