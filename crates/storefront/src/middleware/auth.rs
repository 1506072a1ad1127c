//! Customer authentication extractors.

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};

/// Extractor that requires a logged-in customer.
///
/// Page requests are redirected to the login page with a `next` parameter;
/// HTMX requests get a 401 with `HX-Redirect` so the whole page navigates.
pub struct RequireAuth(pub CurrentCustomer);

pub enum AuthRejection {
    RedirectToLogin(String),
    HtmxRedirect(String),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(location) => Redirect::to(&location).into_response(),
            Self::HtmxRedirect(location) => {
                let mut response = StatusCode::UNAUTHORIZED.into_response();
                if let Ok(value) = HeaderValue::from_str(&location) {
                    response.headers_mut().insert("hx-redirect", value);
                }
                response
            }
        }
    }
}

/// Login URL that returns to `path` afterwards.
#[must_use]
pub fn login_url(path: &str) -> String {
    format!("/auth/login?next={}", urlencoding::encode(path))
}

async fn current_customer(parts: &Parts) -> Option<CurrentCustomer> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(customer) = current_customer(parts).await {
            return Ok(Self(customer));
        }

        let is_htmx = parts.headers.contains_key("hx-request");
        if is_htmx {
            // The fragment URL is useless as a return target; go back to
            // the page the fragment was on.
            let return_to = parts
                .headers
                .get("hx-current-url")
                .and_then(|v| v.to_str().ok())
                .and_then(|u| url::Url::parse(u).ok())
                .map_or_else(|| "/".to_owned(), |u| u.path().to_owned());
            Err(AuthRejection::HtmxRedirect(login_url(&return_to)))
        } else {
            Err(AuthRejection::RedirectToLogin(login_url(parts.uri.path())))
        }
    }
}

/// Extractor that optionally gets the current customer.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_customer(parts).await))
    }
}

/// Store the logged-in customer in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Leave a one-shot notice for the next page that reads it.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_flash(
    session: &Session,
    message: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::FLASH, message.into()).await
}

/// Take the pending notice, if any.
///
/// A broken session simply has no notice.
pub async fn take_flash(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;

    use super::*;

    #[test]
    fn login_url_encodes_the_return_path() {
        assert_eq!(login_url("/checkout"), "/auth/login?next=%2Fcheckout");
    }

    #[tokio::test]
    async fn pages_redirect_to_login_without_a_session() {
        let (mut parts, ()) = Request::builder()
            .uri("/account")
            .body(())
            .unwrap()
            .into_parts();
        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/auth/login?next=%2Faccount"
        );
    }

    #[tokio::test]
    async fn htmx_requests_get_hx_redirect() {
        let request = Request::builder()
            .uri("/orders/4/status")
            .header("hx-request", "true")
            .header("hx-current-url", "http://localhost:3000/orders/4")
            .body(Body::empty())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("hx-redirect").unwrap(),
            "/auth/login?next=%2Forders%2F4"
        );
    }

    #[tokio::test]
    async fn optional_auth_is_none_without_a_session() {
        let (mut parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let OptionalAuth(customer) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(customer.is_none());
    }
}
