//! Authentication route handlers.
//!
//! Handles login, registration and logout against the local customer table.
//! Logging in merges the visitor's guest cart into their saved cart.

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
use crate::middleware::{CspNonce, OptionalAuth, set_current_customer, set_flash};
use crate::models::{CurrentCustomer, Customer};
use crate::routes::local_redirect;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub next: Option<String>,
}

/// Query parameters for the auth pages.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    /// Where to go after logging in.
    pub next: Option<String>,
    /// Error code from a failed attempt.
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<&'static str>,
    pub next: String,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<&'static str>,
    pub next: String,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Message for an `?error=` code. Unknown codes show nothing.
#[must_use]
pub fn error_message(code: &str) -> Option<&'static str> {
    let message = match code {
        "credentials" => "Incorrect email or password.",
        "email" => "Please enter a valid email address.",
        "password_too_short" => "Passwords must be at least 8 characters.",
        "password_mismatch" => "Passwords do not match.",
        "email_taken" => "An account with this email already exists.",
        "failed" => "Something went wrong. Please try again.",
        _ => return None,
    };
    Some(message)
}

/// Error code for a failed register or login attempt.
fn error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidCredentials => "credentials",
        AuthError::InvalidEmail(_) => "email",
        AuthError::PasswordMismatch => "password_mismatch",
        AuthError::PasswordTooShort { .. } => "password_too_short",
        AuthError::CustomerAlreadyExists => "email_taken",
        AuthError::Repository(_) | AuthError::PasswordHash => "failed",
    }
}

/// Back to an auth page with an error, keeping the post-login target.
fn back_with_error(page: &str, code: &str, next: Option<&str>) -> Response {
    let mut url = format!("/auth/{page}?error={code}");
    if let Some(next) = local_redirect(next) {
        url.push_str("&next=");
        url.push_str(&urlencoding::encode(next));
    }
    Redirect::to(&url).into_response()
}

/// Put `customer` in a fresh session and bring their cart along.
async fn start_session(state: &AppState, session: &Session, customer: &Customer) -> Result<()> {
    // New ID on privilege change.
    session.cycle_id().await?;
    set_current_customer(session, &CurrentCustomer::from(customer)).await?;

    let outcome = state
        .cart(session)
        .merge_guest_cart(customer.id, state.config().cart_merge_strategy)
        .await?;
    if !outcome.adjustments.is_empty() {
        set_flash(
            session,
            "Some items from your cart were adjusted to match available stock.",
        )
        .await?;
    }

    set_sentry_user(&customer.id, Some(customer.email.as_str()));
    tracing::info!(customer_id = %customer.id, "customer logged in");
    Ok(())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    Query(query): Query<AuthQuery>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> LoginTemplate {
    LoginTemplate {
        error: query.error.as_deref().and_then(error_message),
        next: local_redirect(query.next.as_deref())
            .unwrap_or_default()
            .to_owned(),
        customer,
        nonce,
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let customer = match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(customer) => customer,
        Err(e @ AuthError::Repository(_)) => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "login failed");
            return Ok(back_with_error(
                "login",
                error_code(&e),
                form.next.as_deref(),
            ));
        }
    };

    start_session(&state, &session, &customer).await?;
    let target = local_redirect(form.next.as_deref()).unwrap_or("/");
    Ok(Redirect::to(target).into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    Query(query): Query<AuthQuery>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> RegisterTemplate {
    RegisterTemplate {
        error: query.error.as_deref().and_then(error_message),
        next: local_redirect(query.next.as_deref())
            .unwrap_or_default()
            .to_owned(),
        customer,
        nonce,
    }
}

/// Handle registration form submission. New customers are logged in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let customer = match AuthService::new(state.pool())
        .register(&form.email, &form.name, &form.password, &form.password_confirm)
        .await
    {
        Ok(customer) => customer,
        Err(e @ AuthError::Repository(_)) => return Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "registration failed");
            return Ok(back_with_error(
                "register",
                error_code(&e),
                form.next.as_deref(),
            ));
        }
    };

    tracing::info!(customer_id = %customer.id, "customer registered");
    start_session(&state, &session, &customer).await?;
    let target = local_redirect(form.next.as_deref()).unwrap_or("/");
    Ok(Redirect::to(target).into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// Log out. The whole session goes, guest cart included.
pub async fn logout(session: Session) -> Result<Redirect> {
    session.flush().await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn every_error_code_has_a_message() {
        let errors = [
            AuthError::InvalidCredentials,
            AuthError::CustomerAlreadyExists,
            AuthError::PasswordMismatch,
            AuthError::PasswordTooShort { min: 8 },
            AuthError::PasswordHash,
        ];
        for err in &errors {
            assert!(error_message(error_code(err)).is_some(), "{err}");
        }
    }

    #[test]
    fn mismatch_and_length_are_told_apart() {
        assert_eq!(error_code(&AuthError::PasswordMismatch), "password_mismatch");
        assert_eq!(
            error_code(&AuthError::PasswordTooShort { min: 8 }),
            "password_too_short"
        );
    }

    #[test]
    fn unknown_codes_are_ignored() {
        assert_eq!(error_message("<script>"), None);
    }

    #[test]
    fn errors_keep_a_local_next() {
        let response = back_with_error("login", "credentials", Some("/checkout"));
        let location = response.headers().get("location").unwrap();
        assert_eq!(location, "/auth/login?error=credentials&next=%2Fcheckout");

        let response = back_with_error("login", "credentials", Some("https://evil.example"));
        let location = response.headers().get("location").unwrap();
        assert_eq!(location, "/auth/login?error=credentials");
    }
}
