//! Catalog domain types.
//!
//! A [`Product`] is sold as [`Variant`]s: one per color × size combination,
//! each optionally pointing at the product image that shows that color and
//! each carrying its own stock count.

use serde::{Deserialize, Serialize};

use crate::types::{
    CategoryId, ColorId, Handle, ImageId, Money, OutfitId, ProductId, SizeId, VariantId,
};

/// A product category ("collection" on the storefront).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub handle: Handle,
    pub description: Option<String>,
}

/// Errors for catalog value validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("color hex must look like #a1b2c3")]
    InvalidHex,
    #[error("{0} cannot be empty")]
    Blank(&'static str),
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("stock cannot be negative")]
    NegativeStock,
}

/// A color a variant can come in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub id: ColorId,
    pub name: String,
    /// Swatch color as `#rrggbb`.
    pub hex: String,
}

impl Color {
    /// Normalize and validate a swatch hex string.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidHex`] unless the input is `#` followed
    /// by exactly six hex digits.
    pub fn normalize_hex(hex: &str) -> Result<String, CatalogError> {
        let hex = hex.trim();
        let digits = hex.strip_prefix('#').ok_or(CatalogError::InvalidHex)?;
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CatalogError::InvalidHex);
        }
        Ok(format!("#{}", digits.to_ascii_lowercase()))
    }
}

/// A garment size. `sort_order` keeps XS < S < M < L regardless of label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    pub label: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub product_id: ProductId,
    pub url: String,
    pub alt: String,
    pub position: i32,
}

/// A purchasable SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub color: Color,
    pub size: Size,
    pub image_id: Option<ImageId>,
    pub sku: String,
    pub stock: u32,
}

impl Variant {
    /// Display label such as `Sand / M`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} / {}", self.color.name, self.size.label)
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub handle: Handle,
    pub description: String,
    /// Every variant sells at this price.
    pub price: Money,
    pub is_active: bool,
    /// Ordered by `position`.
    pub images: Vec<ProductImage>,
    pub variants: Vec<Variant>,
}

/// One size option for a chosen color, with its availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeOption<'a> {
    pub size: &'a Size,
    pub variant: &'a Variant,
}

impl SizeOption<'_> {
    #[must_use]
    pub const fn available(&self) -> bool {
        self.variant.in_stock()
    }
}

impl Product {
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    #[must_use]
    pub fn variant_for(&self, color: ColorId, size: SizeId) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.color.id == color && v.size.id == size)
    }

    /// Distinct colors in first-seen variant order.
    #[must_use]
    pub fn colors(&self) -> Vec<&Color> {
        let mut colors: Vec<&Color> = Vec::new();
        for variant in &self.variants {
            if !colors.iter().any(|c| c.id == variant.color.id) {
                colors.push(&variant.color);
            }
        }
        colors
    }

    /// Sizes offered in `color`, smallest first.
    #[must_use]
    pub fn sizes_for_color(&self, color: ColorId) -> Vec<SizeOption<'_>> {
        let mut options: Vec<SizeOption<'_>> = self
            .variants
            .iter()
            .filter(|v| v.color.id == color)
            .map(|v| SizeOption {
                size: &v.size,
                variant: v,
            })
            .collect();
        options.sort_by_key(|o| (o.size.sort_order, o.size.id));
        options
    }

    #[must_use]
    pub fn total_stock(&self) -> u64 {
        self.variants.iter().map(|v| u64::from(v.stock)).sum()
    }

    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.variants.iter().any(Variant::in_stock)
    }

    /// The image to show for a variant: its own image, else the lead image.
    #[must_use]
    pub fn image_for_variant(&self, variant: &Variant) -> Option<&ProductImage> {
        variant
            .image_id
            .and_then(|id| self.images.iter().find(|img| img.id == id))
            .or_else(|| self.images.first())
    }
}

/// A color/size choice on the product page, resolved against real variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSelection<'a> {
    pub color: Option<&'a Color>,
    pub variant: Option<&'a Variant>,
}

impl<'a> VariantSelection<'a> {
    /// Resolve query-string choices into a concrete selection.
    ///
    /// An unknown or absent color falls back to the first color with stock
    /// (then the first color at all). An unknown size falls back to the first
    /// in-stock size of that color, then the smallest.
    #[must_use]
    pub fn resolve(product: &'a Product, color: Option<ColorId>, size: Option<SizeId>) -> Self {
        let colors = product.colors();
        let color = color
            .and_then(|id| colors.iter().copied().find(|c| c.id == id))
            .or_else(|| {
                colors.iter().copied().find(|c| {
                    product
                        .sizes_for_color(c.id)
                        .iter()
                        .any(SizeOption::available)
                })
            })
            .or_else(|| colors.first().copied());

        let variant = color.and_then(|c| {
            let options = product.sizes_for_color(c.id);
            size.and_then(|id| options.iter().find(|o| o.size.id == id))
                .or_else(|| options.iter().find(|o| o.available()))
                .or_else(|| options.first())
                .map(|o| o.variant)
        });

        Self { color, variant }
    }

    /// Whether the selected variant can be added to a cart right now.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.variant.is_some_and(Variant::in_stock)
    }
}

/// A product as shown in listings (no variants loaded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub handle: Handle,
    pub price: Money,
    pub image_url: Option<String>,
    pub total_stock: i64,
    pub is_active: bool,
}

impl ProductSummary {
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.total_stock > 0
    }
}

/// A curated look made of several products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outfit {
    pub id: OutfitId,
    pub title: String,
    pub handle: Handle,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// In display order.
    pub product_ids: Vec<ProductId>,
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    TitleAsc,
}

impl ProductSort {
    /// Parse a `?sort=` value; anything unrecognized means `Newest`.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("title_asc") => Self::TitleAsc,
            _ => Self::Newest,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::TitleAsc => "title_asc",
        }
    }

    /// `ORDER BY` clause for `shop.product p`. Only fixed strings leave here.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::TitleAsc => "p.title ASC, p.id ASC",
        }
    }
}

/// Filters for product listings (storefront collections, search, admin).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub color: Option<ColorId>,
    pub size: Option<SizeId>,
    /// Case-insensitive match on title or description.
    pub query: Option<String>,
    pub sort: ProductSort,
    pub in_stock_only: bool,
    /// Storefront listings hide inactive products; admin sees everything.
    pub include_inactive: bool,
}

impl ProductFilter {
    /// Normalize a free-text query: trimmed, blank becomes `None`.
    #[must_use]
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_owned);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;
    use crate::types::CurrencyCode;

    pub(crate) fn color(id: i32, name: &str) -> Color {
        Color {
            id: ColorId::new(id),
            name: name.to_owned(),
            hex: "#000000".to_owned(),
        }
    }

    pub(crate) fn size(id: i32, label: &str, sort_order: i32) -> Size {
        Size {
            id: SizeId::new(id),
            label: label.to_owned(),
            sort_order,
        }
    }

    pub(crate) fn variant(id: i32, color: &Color, size: &Size, stock: u32) -> Variant {
        Variant {
            id: VariantId::new(id),
            product_id: ProductId::new(1),
            color: color.clone(),
            size: size.clone(),
            image_id: None,
            sku: format!("SKU-{id}"),
            stock,
        }
    }

    /// Sand in S (sold out) / M / L, Navy in M only (sold out).
    pub(crate) fn shirt() -> Product {
        let sand = color(1, "Sand");
        let navy = color(2, "Navy");
        let s = size(10, "S", 1);
        let m = size(11, "M", 2);
        let l = size(12, "L", 3);
        Product {
            id: ProductId::new(1),
            category_id: Some(CategoryId::new(1)),
            title: "Linen Shirt".to_owned(),
            handle: Handle::parse("linen-shirt").unwrap(),
            description: String::new(),
            price: Money::from_cents(4500, CurrencyCode::USD),
            is_active: true,
            images: vec![
                ProductImage {
                    id: ImageId::new(100),
                    product_id: ProductId::new(1),
                    url: "/img/sand.jpg".to_owned(),
                    alt: "Sand".to_owned(),
                    position: 0,
                },
                ProductImage {
                    id: ImageId::new(101),
                    product_id: ProductId::new(1),
                    url: "/img/navy.jpg".to_owned(),
                    alt: "Navy".to_owned(),
                    position: 1,
                },
            ],
            variants: vec![
                variant(1, &sand, &l, 4),
                variant(2, &sand, &s, 0),
                variant(3, &sand, &m, 2),
                Variant {
                    image_id: Some(ImageId::new(101)),
                    ..variant(4, &navy, &m, 0)
                },
            ],
        }
    }

    #[test]
    fn colors_keep_first_seen_order() {
        let product = shirt();
        let names: Vec<&str> = product.colors().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Sand", "Navy"]);
    }

    #[test]
    fn sizes_sorted_by_sort_order() {
        let product = shirt();
        let labels: Vec<&str> = product
            .sizes_for_color(ColorId::new(1))
            .iter()
            .map(|o| o.size.label.as_str())
            .collect();
        assert_eq!(labels, ["S", "M", "L"]);
    }

    #[test]
    fn stock_helpers() {
        let product = shirt();
        assert_eq!(product.total_stock(), 6);
        assert!(product.is_in_stock());
        assert_eq!(
            product
                .variant_for(ColorId::new(1), SizeId::new(11))
                .map(|v| v.id),
            Some(VariantId::new(3))
        );
        assert!(product.variant_for(ColorId::new(2), SizeId::new(10)).is_none());
    }

    #[test]
    fn variant_image_falls_back_to_lead_image() {
        let product = shirt();
        let navy = product.variant(VariantId::new(4)).unwrap();
        let sand = product.variant(VariantId::new(1)).unwrap();
        assert_eq!(product.image_for_variant(navy).unwrap().id, ImageId::new(101));
        assert_eq!(product.image_for_variant(sand).unwrap().id, ImageId::new(100));
    }

    #[test]
    fn selection_defaults_to_first_in_stock() {
        let product = shirt();
        let selection = VariantSelection::resolve(&product, None, None);
        assert_eq!(selection.color.unwrap().name, "Sand");
        // S is sold out, so M is picked.
        assert_eq!(selection.variant.unwrap().id, VariantId::new(3));
        assert!(selection.is_purchasable());
    }

    #[test]
    fn selection_honours_explicit_sold_out_choice() {
        let product = shirt();
        let selection =
            VariantSelection::resolve(&product, Some(ColorId::new(2)), Some(SizeId::new(11)));
        assert_eq!(selection.variant.unwrap().id, VariantId::new(4));
        assert!(!selection.is_purchasable());
    }

    #[test]
    fn selection_ignores_unknown_ids() {
        let product = shirt();
        let selection =
            VariantSelection::resolve(&product, Some(ColorId::new(99)), Some(SizeId::new(99)));
        assert_eq!(selection.color.unwrap().id, ColorId::new(1));
        assert_eq!(selection.variant.unwrap().id, VariantId::new(3));
    }

    #[test]
    fn hex_normalization() {
        assert_eq!(Color::normalize_hex(" #A1B2C3 ").unwrap(), "#a1b2c3");
        assert_eq!(Color::normalize_hex("a1b2c3"), Err(CatalogError::InvalidHex));
        assert_eq!(Color::normalize_hex("#12345"), Err(CatalogError::InvalidHex));
        assert_eq!(Color::normalize_hex("#12345g"), Err(CatalogError::InvalidHex));
    }

    #[test]
    fn sort_parsing_falls_back_to_newest() {
        assert_eq!(ProductSort::from_query(Some("price_desc")), ProductSort::PriceDesc);
        assert_eq!(ProductSort::from_query(Some("bogus")), ProductSort::Newest);
        assert_eq!(ProductSort::from_query(None), ProductSort::Newest);
    }

    #[test]
    fn blank_query_is_dropped() {
        let filter = ProductFilter::default().with_query(Some("   "));
        assert_eq!(filter.query, None);
        let filter = ProductFilter::default().with_query(Some(" coat "));
        assert_eq!(filter.query.as_deref(), Some("coat"));
    }
}
