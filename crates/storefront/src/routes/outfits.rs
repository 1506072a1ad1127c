//! Outfit route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use tracing::instrument;

use loomwear_core::catalog::Outfit;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::models::CurrentCustomer;
use crate::routes::products::{ProductCardView, path_handle};
use crate::state::AppState;

#[derive(Clone)]
pub struct OutfitCardView {
    pub handle: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub piece_count: usize,
}

impl From<&Outfit> for OutfitCardView {
    fn from(outfit: &Outfit) -> Self {
        Self {
            handle: outfit.handle.to_string(),
            title: outfit.title.clone(),
            description: outfit.description.clone(),
            image_url: outfit.image_url.clone(),
            piece_count: outfit.product_ids.len(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "outfits/index.html")]
pub struct OutfitsIndexTemplate {
    pub outfits: Vec<OutfitCardView>,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "outfits/show.html")]
pub struct OutfitShowTemplate {
    pub outfit: OutfitCardView,
    /// Pieces in outfit order; inactive products are left out.
    pub products: Vec<ProductCardView>,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

#[instrument(skip(state, customer, nonce))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<OutfitsIndexTemplate> {
    let outfits = state.catalog().outfits().await?;
    Ok(OutfitsIndexTemplate {
        outfits: outfits.iter().map(OutfitCardView::from).collect(),
        customer,
        nonce,
    })
}

#[instrument(skip(state, customer, nonce))]
pub async fn show(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<OutfitShowTemplate> {
    let handle = path_handle(&handle, "outfit")?;
    let detail = state
        .catalog()
        .outfit(&handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("outfit {handle}")))?;

    Ok(OutfitShowTemplate {
        outfit: OutfitCardView::from(&detail.outfit),
        products: detail
            .products
            .iter()
            .filter(|p| p.is_active)
            .map(ProductCardView::from)
            .collect(),
        customer,
        nonce,
    })
}
