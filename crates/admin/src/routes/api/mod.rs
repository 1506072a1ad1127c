//! JSON API for the back-office.
//!
//! Reads need a logged-in admin, writes need a role that can write.
//! Creates answer `201` with the new resource, deletes answer `204`.

pub mod categories;
pub mod colors;
pub mod orders;
pub mod outfits;
pub mod products;
pub mod sizes;
pub mod users;

use axum::{Json, Router, http::StatusCode};
use loomwear_core::Handle;
use loomwear_core::catalog::CatalogError;

use crate::error::Result;
use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(categories::router())
        .merge(colors::router())
        .merge(sizes::router())
        .merge(products::router())
        .merge(outfits::router())
        .merge(users::router())
        .merge(orders::router())
}

/// `201 Created` with the resource as the body.
pub(crate) const fn created<T>(value: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(value))
}

/// Trimmed `value`, or `CatalogError::Blank` naming `field`.
pub(crate) fn required(value: &str, field: &'static str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Blank(field).into());
    }
    Ok(value.to_owned())
}

/// Trimmed text, with blank treated as absent.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// The explicit handle when one is given, otherwise one derived from `title`.
pub(crate) fn resolve_handle(explicit: Option<&str>, title: &str) -> Result<Handle> {
    match explicit.map(str::trim).filter(|h| !h.is_empty()) {
        Some(handle) => Ok(Handle::parse(handle)?),
        None => Ok(Handle::from_title(title)?),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn handle_defaults_to_title() {
        let handle = resolve_handle(None, "Linen Shirt").unwrap();
        assert_eq!(handle.as_str(), "linen-shirt");

        let handle = resolve_handle(Some("  "), "Linen Shirt").unwrap();
        assert_eq!(handle.as_str(), "linen-shirt");
    }

    #[test]
    fn explicit_handle_is_validated() {
        assert_eq!(
            resolve_handle(Some("summer-edit"), "Whatever").unwrap().as_str(),
            "summer-edit"
        );
        assert!(matches!(
            resolve_handle(Some("Not A Handle"), "x"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert_eq!(required("  Navy ", "name").unwrap(), "Navy");
        let err = required(" ", "name").unwrap_err();
        assert_eq!(err.to_string(), "Bad request: name cannot be empty");
    }

    #[test]
    fn blank_optional_text_is_none() {
        assert_eq!(optional_text(Some("   ".to_owned())), None);
        assert_eq!(optional_text(Some(" hi ".to_owned())), Some("hi".to_owned()));
    }
}
