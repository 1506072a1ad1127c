//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /auth/login              - Login page
//! POST /auth/login              - Login action
//! POST /auth/logout             - Logout action
//!
//! # Requires auth
//! GET  /                        - Dashboard (entity counts, orders per status)
//! /api/...                      - JSON API, see [`api`]
//! ```

pub mod api;
pub mod auth;
pub mod dashboard;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/auth/login", get(auth::login_page).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .merge(api::router())
}
