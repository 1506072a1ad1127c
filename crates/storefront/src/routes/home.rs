//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use loomwear_core::catalog::ProductFilter;

use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::models::CurrentCustomer;
use crate::routes::collections::CategoryView;
use crate::routes::outfits::OutfitCardView;
use crate::routes::products::ProductCardView;
use crate::state::AppState;

const NEW_ARRIVALS: i64 = 8;
const FEATURED_OUTFITS: usize = 3;

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub categories: Vec<CategoryView>,
    pub new_arrivals: Vec<ProductCardView>,
    pub outfits: Vec<OutfitCardView>,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Display the home page.
#[instrument(skip(state, customer, nonce))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<HomeTemplate> {
    let catalog = state.catalog();
    let categories = catalog.categories().await?;
    let products = catalog
        .products(&ProductFilter::default(), NEW_ARRIVALS)
        .await?;
    let outfits = catalog.outfits().await?;

    Ok(HomeTemplate {
        categories: categories.iter().map(CategoryView::from).collect(),
        new_arrivals: products.iter().map(ProductCardView::from).collect(),
        outfits: outfits
            .iter()
            .take(FEATURED_OUTFITS)
            .map(OutfitCardView::from)
            .collect(),
        customer,
        nonce,
    })
}
