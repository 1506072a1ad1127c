//! Unified error handling for admin.
//!
//! Errors render as `{"error": "..."}` with the matching status, since the
//! JSON API is where nearly all of them surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loomwear_core::HandleError;
use loomwear_core::catalog::CatalogError;
use serde_json::json;
use thiserror::Error;

use crate::db::{RepositoryError, StatusChangeError};
use crate::services::AdminAuthError;

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] AdminAuthError),

    #[error("Order status error: {0}")]
    StatusChange(#[from] StatusChangeError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<HandleError> for AppError {
    fn from(err: HandleError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl AppError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::InvalidReference(_) => StatusCode::BAD_REQUEST,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AdminAuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AdminAuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AdminAuthError::InvalidEmail(_) | AdminAuthError::WeakPassword(_) => {
                    StatusCode::BAD_REQUEST
                }
                AdminAuthError::Repository(_) | AdminAuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::StatusChange(err) => match err {
                StatusChangeError::NotFound => StatusCode::NOT_FOUND,
                StatusChangeError::InvalidTransition { .. } => StatusCode::CONFLICT,
                StatusChangeError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg) | RepositoryError::InvalidReference(msg)) => {
                msg.clone()
            }
            Self::StatusChange(err @ (StatusChangeError::NotFound
            | StatusChangeError::InvalidTransition { .. })) => err.to_string(),
            Self::Auth(AdminAuthError::InvalidCredentials) => "Invalid email or password".to_owned(),
            Self::Auth(err @ (AdminAuthError::UserAlreadyExists
            | AdminAuthError::InvalidEmail(_)
            | AdminAuthError::WeakPassword(_))) => err.to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
            _ => "Internal server error".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an admin user ID.
pub fn set_sentry_user(admin_user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(admin_user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use loomwear_core::OrderStatus;

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 123".to_string());
        assert_eq!(err.to_string(), "Not found: order 123");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn repository_errors_map_to_client_statuses() {
        assert_eq!(get_status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(RepositoryError::Conflict("color name already exists".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::InvalidReference("variant".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(get_status(CatalogError::NegativePrice), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(HandleError::Empty), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn illegal_transitions_conflict() {
        let err = StatusChangeError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        };
        let app_err = AppError::from(err);
        assert_eq!(app_err.status(), StatusCode::CONFLICT);
        assert_eq!(
            app_err.public_message(),
            "cannot move an order from delivered to cancelled"
        );
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("row 9".to_string()));
        assert_eq!(err.public_message(), "Internal server error");
    }
}
