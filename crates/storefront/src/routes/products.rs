//! Product page and the product card view shared by listings.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use loomwear_core::cart::MAX_LINE_QUANTITY;
use loomwear_core::catalog::{Product, ProductImage, ProductSummary, VariantSelection};
use loomwear_core::{ColorId, Handle, SizeId};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::models::CurrentCustomer;
use crate::routes::query_id;
use crate::state::AppState;

/// Stock at or below which the page says "only N left".
const LOW_STOCK_THRESHOLD: u32 = 3;

/// Product card in listings (home, collections, outfits, search).
#[derive(Clone)]
pub struct ProductCardView {
    pub handle: String,
    pub title: String,
    pub price: String,
    pub image_url: Option<String>,
    pub in_stock: bool,
}

impl From<&ProductSummary> for ProductCardView {
    fn from(product: &ProductSummary) -> Self {
        Self {
            handle: product.handle.to_string(),
            title: product.title.clone(),
            price: product.price.to_string(),
            image_url: product.image_url.clone(),
            in_stock: product.is_in_stock(),
        }
    }
}

#[derive(Clone)]
pub struct ImageView {
    pub url: String,
    pub alt: String,
}

impl From<&ProductImage> for ImageView {
    fn from(image: &ProductImage) -> Self {
        Self {
            url: image.url.clone(),
            alt: image.alt.clone(),
        }
    }
}

/// A color swatch link.
#[derive(Clone)]
pub struct ColorChoice {
    pub name: String,
    pub hex: String,
    pub href: String,
    pub selected: bool,
}

/// A size link within the selected color.
#[derive(Clone)]
pub struct SizeChoice {
    pub label: String,
    pub href: String,
    pub selected: bool,
    pub available: bool,
}

/// The variant the add-to-cart form will add.
#[derive(Clone)]
pub struct SelectedVariantView {
    pub variant_id: i32,
    pub label: String,
    pub sku: String,
    pub stock: u32,
    pub max_quantity: u32,
    pub purchasable: bool,
    pub low_stock: bool,
}

/// Everything the product page shows, resolved from `?color=&size=`.
pub struct ProductDetailView {
    pub handle: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub image: Option<ImageView>,
    pub gallery: Vec<ImageView>,
    pub colors: Vec<ColorChoice>,
    pub sizes: Vec<SizeChoice>,
    pub selected: Option<SelectedVariantView>,
}

impl ProductDetailView {
    #[must_use]
    pub fn build(product: &Product, color: Option<ColorId>, size: Option<SizeId>) -> Self {
        let selection = VariantSelection::resolve(product, color, size);
        let handle = product.handle.as_str();
        let selected_color = selection.color.map(|c| c.id);
        let selected_variant = selection.variant.map(|v| v.id);

        let colors = product
            .colors()
            .into_iter()
            .map(|c| ColorChoice {
                name: c.name.clone(),
                hex: c.hex.clone(),
                href: format!("/products/{handle}?color={}", c.id),
                selected: Some(c.id) == selected_color,
            })
            .collect();

        let sizes = selected_color
            .map(|color| {
                product
                    .sizes_for_color(color)
                    .iter()
                    .map(|o| SizeChoice {
                        label: o.size.label.clone(),
                        href: format!("/products/{handle}?color={color}&size={}", o.size.id),
                        selected: Some(o.variant.id) == selected_variant,
                        available: o.available(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let image = selection
            .variant
            .and_then(|v| product.image_for_variant(v))
            .or_else(|| product.images.first())
            .map(ImageView::from);

        let selected = selection.variant.map(|v| SelectedVariantView {
            variant_id: v.id.as_i32(),
            label: v.label(),
            sku: v.sku.clone(),
            stock: v.stock,
            max_quantity: v.stock.min(MAX_LINE_QUANTITY),
            purchasable: v.in_stock(),
            low_stock: v.in_stock() && v.stock <= LOW_STOCK_THRESHOLD,
        });

        Self {
            handle: handle.to_owned(),
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            image,
            gallery: product.images.iter().map(ImageView::from).collect(),
            colors,
            sizes,
            selected,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VariantQuery {
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: ProductDetailView,
    pub customer: Option<CurrentCustomer>,
    pub nonce: String,
}

/// Parse a path handle; anything malformed simply does not exist.
pub fn path_handle(raw: &str, what: &str) -> Result<Handle> {
    Handle::parse(raw).map_err(|_| AppError::NotFound(format!("{what} {raw}")))
}

/// Display product detail page.
#[instrument(skip(state, customer, nonce))]
pub async fn show(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Query(query): Query<VariantQuery>,
    OptionalAuth(customer): OptionalAuth,
    CspNonce(nonce): CspNonce,
) -> Result<ProductShowTemplate> {
    let handle = path_handle(&handle, "product")?;
    let product = state
        .catalog()
        .product(&handle)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {handle}")))?;

    let color = query_id(query.color.as_deref()).map(ColorId::new);
    let size = query_id(query.size.as_deref()).map(SizeId::new);

    Ok(ProductShowTemplate {
        product: ProductDetailView::build(&product, color, size),
        customer,
        nonce,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loomwear_core::catalog::{Color, Size, Variant};
    use loomwear_core::{CurrencyCode, ImageId, Money, ProductId, VariantId};

    use super::*;

    fn variant(id: i32, color: (i32, &str), size: (i32, &str, i32), stock: u32) -> Variant {
        Variant {
            id: VariantId::new(id),
            product_id: ProductId::new(1),
            color: Color {
                id: ColorId::new(color.0),
                name: color.1.to_owned(),
                hex: "#000000".to_owned(),
            },
            size: Size {
                id: SizeId::new(size.0),
                label: size.1.to_owned(),
                sort_order: size.2,
            },
            image_id: (color.0 == 2).then(|| ImageId::new(20)),
            sku: format!("SKU-{id}"),
            stock,
        }
    }

    fn product() -> Product {
        Product {
            id: ProductId::new(1),
            category_id: None,
            title: "Linen Shirt".to_owned(),
            handle: Handle::parse("linen-shirt").unwrap(),
            description: "Breathable.".to_owned(),
            price: Money::from_cents(4500, CurrencyCode::USD),
            is_active: true,
            images: vec![
                ProductImage {
                    id: ImageId::new(10),
                    product_id: ProductId::new(1),
                    url: "https://img.example/sand.jpg".to_owned(),
                    alt: "Sand".to_owned(),
                    position: 0,
                },
                ProductImage {
                    id: ImageId::new(20),
                    product_id: ProductId::new(1),
                    url: "https://img.example/navy.jpg".to_owned(),
                    alt: "Navy".to_owned(),
                    position: 1,
                },
            ],
            variants: vec![
                variant(1, (1, "Sand"), (1, "S", 0), 0),
                variant(2, (1, "Sand"), (2, "M", 1), 0),
                variant(3, (2, "Navy"), (1, "S", 0), 2),
                variant(4, (2, "Navy"), (2, "M", 1), 12),
            ],
        }
    }

    #[test]
    fn default_selection_prefers_a_color_with_stock() {
        let view = ProductDetailView::build(&product(), None, None);
        let selected = view.selected.unwrap();
        assert_eq!(selected.variant_id, 3);
        assert!(selected.purchasable);
        assert!(selected.low_stock);
        assert_eq!(view.image.unwrap().url, "https://img.example/navy.jpg");
        assert!(view.colors.iter().any(|c| c.name == "Navy" && c.selected));
    }

    #[test]
    fn explicit_choice_is_kept_even_when_sold_out() {
        let view = ProductDetailView::build(&product(), Some(ColorId::new(1)), Some(SizeId::new(2)));
        let selected = view.selected.unwrap();
        assert_eq!(selected.variant_id, 2);
        assert!(!selected.purchasable);
        assert!(view.sizes.iter().all(|s| !s.available));
        assert_eq!(view.image.unwrap().url, "https://img.example/sand.jpg");
    }

    #[test]
    fn quantity_is_capped_per_line() {
        let view = ProductDetailView::build(&product(), Some(ColorId::new(2)), Some(SizeId::new(2)));
        let selected = view.selected.unwrap();
        assert_eq!(selected.stock, 12);
        assert_eq!(selected.max_quantity, MAX_LINE_QUANTITY);
        assert!(!selected.low_stock);
    }

    #[test]
    fn size_links_keep_the_color() {
        let view = ProductDetailView::build(&product(), Some(ColorId::new(2)), None);
        let hrefs: Vec<&str> = view.sizes.iter().map(|s| s.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec![
                "/products/linen-shirt?color=2&size=1",
                "/products/linen-shirt?color=2&size=2"
            ]
        );
    }
}
