//! Product search.
//!
//! A case-insensitive match on title and description. Results are never
//! cached.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::instrument;

use loomwear_core::catalog::ProductFilter;

use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::models::CurrentCustomer;
use crate::routes::products::ProductCardView;
use crate::state::AppState;

const MAX_RESULTS: i64 = 48;

/// Longest query we pass to the database.
const MAX_QUERY_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub query: String,
    /// `None` until something was searched for.
    pub results: Option<Vec<ProductCardView>>,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

#[instrument(skip(state, customer, nonce))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<SearchTemplate> {
    let text: String = query
        .q
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(MAX_QUERY_CHARS)
        .collect();
    let filter = ProductFilter::default().with_query(Some(&text));

    let results = if filter.query.is_some() {
        let products = state.catalog().products(&filter, MAX_RESULTS).await?;
        tracing::debug!(results = products.len(), "search");
        Some(products.iter().map(ProductCardView::from).collect())
    } else {
        None
    };

    Ok(SearchTemplate {
        query: text.trim().to_owned(),
        results,
        customer,
        nonce,
    })
}
