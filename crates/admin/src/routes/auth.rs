//! Admin login and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAdminAuth, set_current_admin};
use crate::models::CurrentAdmin;
use crate::services::{AdminAuthError, AdminAuthService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<&'static str>,
    pub admin: Option<CurrentAdmin>,
}

fn error_message(code: &str) -> Option<&'static str> {
    match code {
        "credentials" => Some("Invalid email or password."),
        _ => None,
    }
}

/// GET /auth/login
pub async fn login_page(
    OptionalAdminAuth(admin): OptionalAdminAuth,
    Query(query): Query<LoginQuery>,
) -> Response {
    if admin.is_some() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        error: query.error.as_deref().and_then(error_message),
        admin: None,
    }
    .into_response()
}

/// POST /auth/login
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect> {
    let admin = match AdminAuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(admin) => admin,
        Err(AdminAuthError::InvalidCredentials) => {
            tracing::info!("admin login failed");
            return Ok(Redirect::to("/auth/login?error=credentials"));
        }
        Err(e) => return Err(e.into()),
    };

    // New session ID on privilege change.
    session.cycle_id().await?;
    set_current_admin(&session, &CurrentAdmin::from(&admin)).await?;
    set_sentry_user(&admin.id, Some(admin.email.as_str()));
    tracing::info!(admin_id = %admin.id, role = %admin.role, "admin logged in");

    Ok(Redirect::to("/"))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> Result<Redirect> {
    session.flush().await?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_error_codes_render() {
        assert!(error_message("credentials").is_some());
        assert_eq!(error_message("<script>"), None);
    }

    #[test]
    fn login_page_shows_error() {
        let html = LoginTemplate {
            error: error_message("credentials"),
            admin: None,
        }
        .render()
        .unwrap_or_default();
        assert!(html.contains("Invalid email or password."));
        assert!(html.contains(r#"action="/auth/login""#));
    }
}
