//! Catalog seeding from a YAML file.
//!
//! The file lists colors, sizes, categories, products (with their images and
//! variants) and outfits. Seeding is an upsert keyed on natural keys, so the
//! same file can be applied any number of times:
//!
//! | Entity   | Key                    |
//! |----------|------------------------|
//! | color    | name                   |
//! | size     | label                  |
//! | category | handle                 |
//! | product  | handle                 |
//! | image    | product + url          |
//! | variant  | SKU                    |
//! | outfit   | handle                 |
//!
//! Variants name their color and size; outfits name their products by
//! handle. Those references resolve against the database after the file's
//! own rows are written, so a file may refer to rows seeded earlier.
//!
//! ```yaml
//! colors:
//!   - { name: Navy, hex: "#1f2a44" }
//! sizes:
//!   - { label: M }
//! categories:
//!   - { name: Shirts }
//! products:
//!   - title: Linen Shirt
//!     category: shirts
//!     price: "49.00"
//!     images:
//!       - { url: /static/img/linen-navy.jpg, alt: Navy linen shirt }
//!     variants:
//!       - { color: Navy, size: M, sku: LIN-NVY-M, stock: 12, image: 0 }
//! outfits:
//!   - { title: Weekend, products: [linen-shirt] }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::instrument;

use loomwear_core::catalog::Color;
use loomwear_core::{CategoryId, ColorId, Handle, ImageId, OutfitId, ProductId, SizeId};

/// Errors from seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("io error: {0}")]
    Io(String),

    #[error("invalid catalog: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// File format
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCatalog {
    #[serde(default)]
    pub colors: Vec<SeedColor>,
    #[serde(default)]
    pub sizes: Vec<SeedSize>,
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub outfits: Vec<SeedOutfit>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedColor {
    pub name: String,
    pub hex: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedSize {
    pub label: String,
    /// Defaults to the size's position in the file.
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    pub handle: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub title: String,
    pub handle: Option<String>,
    /// Category handle.
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub images: Vec<SeedImage>,
    #[serde(default)]
    pub variants: Vec<SeedVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedImage {
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedVariant {
    /// Color name.
    pub color: String,
    /// Size label.
    pub size: String,
    pub sku: String,
    #[serde(default)]
    pub stock: i32,
    /// Index into the product's `images`.
    pub image: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedOutfit {
    pub title: String,
    pub handle: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Product handles, in display order.
    #[serde(default)]
    pub products: Vec<String>,
}

const fn default_true() -> bool {
    true
}

fn handle_for(explicit: Option<&str>, title: &str) -> Result<Handle, String> {
    match explicit {
        Some(handle) => Handle::parse(handle).map_err(|e| format!("handle {handle:?}: {e}")),
        None => Handle::from_title(title).map_err(|e| format!("title {title:?}: {e}")),
    }
}

/// Rows written, per entity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub colors: usize,
    pub sizes: usize,
    pub categories: usize,
    pub products: usize,
    pub images: usize,
    pub variants: usize,
    pub outfits: usize,
}

// =============================================================================
// Validation
// =============================================================================

/// Check a catalog without touching the database.
///
/// Returns every problem found; an empty list means the file can be applied.
#[must_use]
pub fn validate_catalog(catalog: &SeedCatalog) -> Vec<String> {
    let mut errors = Vec::new();

    for color in &catalog.colors {
        if color.name.trim().is_empty() {
            errors.push("color with an empty name".to_owned());
        }
        if Color::normalize_hex(&color.hex).is_err() {
            errors.push(format!("color {:?}: invalid hex {:?}", color.name, color.hex));
        }
    }

    for size in &catalog.sizes {
        if size.label.trim().is_empty() {
            errors.push("size with an empty label".to_owned());
        }
    }

    for category in &catalog.categories {
        if let Err(e) = handle_for(category.handle.as_deref(), &category.name) {
            errors.push(format!("category {:?}: {e}", category.name));
        }
    }

    let mut skus = HashSet::new();
    for product in &catalog.products {
        let title = &product.title;
        if let Err(e) = handle_for(product.handle.as_deref(), title) {
            errors.push(format!("product {title:?}: {e}"));
        }
        if product.price < Decimal::ZERO {
            errors.push(format!("product {title:?}: price cannot be negative"));
        }

        let mut combos = HashSet::new();
        for variant in &product.variants {
            if variant.sku.trim().is_empty() {
                errors.push(format!("product {title:?}: variant with an empty SKU"));
            } else if !skus.insert(variant.sku.trim()) {
                errors.push(format!("duplicate SKU {:?}", variant.sku));
            }
            if !combos.insert((variant.color.as_str(), variant.size.as_str())) {
                errors.push(format!(
                    "product {title:?}: {} / {} listed twice",
                    variant.color, variant.size
                ));
            }
            if variant.stock < 0 {
                errors.push(format!("variant {:?}: stock cannot be negative", variant.sku));
            }
            if variant.image.is_some_and(|i| i >= product.images.len()) {
                errors.push(format!("variant {:?}: image index out of range", variant.sku));
            }
        }
    }

    for outfit in &catalog.outfits {
        if let Err(e) = handle_for(outfit.handle.as_deref(), &outfit.title) {
            errors.push(format!("outfit {:?}: {e}", outfit.title));
        }
    }

    errors
}

// =============================================================================
// Seeding
// =============================================================================

/// Read, validate and apply a YAML catalog.
///
/// # Errors
///
/// Returns `SeedError::Io` if the file cannot be read, `SeedError::Config`
/// if it does not parse or validate, and `SeedError::Database` if a write
/// fails. Nothing is written unless everything is.
#[instrument(skip(pool), fields(path = %path.as_ref().display()))]
pub async fn seed_from_file<P: AsRef<Path>>(pool: &PgPool, path: P) -> Result<SeedResult, SeedError> {
    let path = path.as_ref();

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SeedError::Io(format!("Failed to read {}: {e}", path.display())))?;

    let catalog: SeedCatalog = serde_yaml::from_str(&content)
        .map_err(|e| SeedError::Config(format!("Failed to parse YAML: {e}")))?;

    seed_from_catalog(pool, &catalog).await
}

/// Apply a catalog in one transaction.
///
/// # Errors
///
/// Returns `SeedError::Config` for validation failures or references to
/// colors, sizes, categories or products that do not exist, and
/// `SeedError::Database` if a write fails.
#[instrument(skip_all, fields(products = catalog.products.len()))]
pub async fn seed_from_catalog(
    pool: &PgPool,
    catalog: &SeedCatalog,
) -> Result<SeedResult, SeedError> {
    let errors = validate_catalog(catalog);
    if !errors.is_empty() {
        return Err(SeedError::Config(errors.join("; ")));
    }

    let mut tx = pool.begin().await?;
    let mut result = SeedResult::default();

    for color in &catalog.colors {
        let hex = Color::normalize_hex(&color.hex).map_err(|e| SeedError::Config(e.to_string()))?;
        sqlx::query(
            r"
            INSERT INTO shop.color (name, hex) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET hex = EXCLUDED.hex
            ",
        )
        .bind(color.name.trim())
        .bind(hex)
        .execute(&mut *tx)
        .await?;
        result.colors += 1;
    }

    for (position, size) in catalog.sizes.iter().enumerate() {
        let sort_order = size
            .sort_order
            .unwrap_or_else(|| i32::try_from(position).unwrap_or(i32::MAX));
        sqlx::query(
            r"
            INSERT INTO shop.size (label, sort_order) VALUES ($1, $2)
            ON CONFLICT (label) DO UPDATE SET sort_order = EXCLUDED.sort_order
            ",
        )
        .bind(size.label.trim())
        .bind(sort_order)
        .execute(&mut *tx)
        .await?;
        result.sizes += 1;
    }

    for category in &catalog.categories {
        let handle = handle_for(category.handle.as_deref(), &category.name).map_err(SeedError::Config)?;
        sqlx::query(
            r"
            INSERT INTO shop.category (name, handle, description) VALUES ($1, $2, $3)
            ON CONFLICT (handle) DO UPDATE
            SET name = EXCLUDED.name, description = EXCLUDED.description
            ",
        )
        .bind(category.name.trim())
        .bind(&handle)
        .bind(category.description.as_deref())
        .execute(&mut *tx)
        .await?;
        result.categories += 1;
    }

    let colors: HashMap<String, ColorId> = lookup(&mut tx, "SELECT name, id FROM shop.color").await?;
    let sizes: HashMap<String, SizeId> = lookup(&mut tx, "SELECT label, id FROM shop.size").await?;
    let categories: HashMap<String, CategoryId> =
        lookup(&mut tx, "SELECT handle, id FROM shop.category").await?;

    for product in &catalog.products {
        seed_product(&mut tx, product, &colors, &sizes, &categories, &mut result).await?;
    }

    let products: HashMap<String, ProductId> =
        lookup(&mut tx, "SELECT handle, id FROM shop.product").await?;

    for outfit in &catalog.outfits {
        seed_outfit(&mut tx, outfit, &products).await?;
        result.outfits += 1;
    }

    tx.commit().await?;
    tracing::info!(?result, "catalog seeded");
    Ok(result)
}

async fn seed_product(
    tx: &mut Transaction<'_, Postgres>,
    product: &SeedProduct,
    colors: &HashMap<String, ColorId>,
    sizes: &HashMap<String, SizeId>,
    categories: &HashMap<String, CategoryId>,
    result: &mut SeedResult,
) -> Result<(), SeedError> {
    let handle = handle_for(product.handle.as_deref(), &product.title).map_err(SeedError::Config)?;
    let category_id = product
        .category
        .as_deref()
        .map(|c| {
            categories
                .get(c)
                .copied()
                .ok_or_else(|| SeedError::Config(format!("product {handle}: unknown category {c:?}")))
        })
        .transpose()?;

    let (product_id,) = sqlx::query_as::<_, (ProductId,)>(
        r"
        INSERT INTO shop.product (category_id, title, handle, description, price, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (handle) DO UPDATE
        SET category_id = EXCLUDED.category_id,
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            price = EXCLUDED.price,
            is_active = EXCLUDED.is_active,
            updated_at = NOW()
        RETURNING id
        ",
    )
    .bind(category_id)
    .bind(product.title.trim())
    .bind(&handle)
    .bind(product.description.trim())
    .bind(product.price)
    .bind(product.is_active)
    .fetch_one(&mut **tx)
    .await?;
    result.products += 1;

    let mut image_ids = Vec::with_capacity(product.images.len());
    for (position, image) in product.images.iter().enumerate() {
        let position = i32::try_from(position).unwrap_or(i32::MAX);
        let existing = sqlx::query_as::<_, (ImageId,)>(
            "SELECT id FROM shop.product_image WHERE product_id = $1 AND url = $2 ORDER BY id LIMIT 1",
        )
        .bind(product_id)
        .bind(&image.url)
        .fetch_optional(&mut **tx)
        .await?;

        let image_id = if let Some((id,)) = existing {
            sqlx::query("UPDATE shop.product_image SET alt = $2, position = $3 WHERE id = $1")
                .bind(id)
                .bind(&image.alt)
                .bind(position)
                .execute(&mut **tx)
                .await?;
            id
        } else {
            let (id,) = sqlx::query_as::<_, (ImageId,)>(
                r"
                INSERT INTO shop.product_image (product_id, url, alt, position)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(product_id)
            .bind(&image.url)
            .bind(&image.alt)
            .bind(position)
            .fetch_one(&mut **tx)
            .await?;
            id
        };
        image_ids.push(image_id);
        result.images += 1;
    }

    for variant in &product.variants {
        let color_id = colors.get(variant.color.trim()).copied().ok_or_else(|| {
            SeedError::Config(format!("variant {}: unknown color {:?}", variant.sku, variant.color))
        })?;
        let size_id = sizes.get(variant.size.trim()).copied().ok_or_else(|| {
            SeedError::Config(format!("variant {}: unknown size {:?}", variant.sku, variant.size))
        })?;
        let image_id = variant.image.and_then(|i| image_ids.get(i).copied());

        sqlx::query(
            r"
            INSERT INTO shop.variant (product_id, color_id, size_id, image_id, sku, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (sku) DO UPDATE
            SET product_id = EXCLUDED.product_id,
                color_id = EXCLUDED.color_id,
                size_id = EXCLUDED.size_id,
                image_id = EXCLUDED.image_id,
                stock = EXCLUDED.stock
            ",
        )
        .bind(product_id)
        .bind(color_id)
        .bind(size_id)
        .bind(image_id)
        .bind(variant.sku.trim())
        .bind(variant.stock)
        .execute(&mut **tx)
        .await?;
        result.variants += 1;
    }

    Ok(())
}

async fn seed_outfit(
    tx: &mut Transaction<'_, Postgres>,
    outfit: &SeedOutfit,
    products: &HashMap<String, ProductId>,
) -> Result<(), SeedError> {
    let handle = handle_for(outfit.handle.as_deref(), &outfit.title).map_err(SeedError::Config)?;

    let mut product_ids: Vec<ProductId> = Vec::with_capacity(outfit.products.len());
    for product in &outfit.products {
        let id = products.get(product).copied().ok_or_else(|| {
            SeedError::Config(format!("outfit {handle}: unknown product {product:?}"))
        })?;
        if !product_ids.contains(&id) {
            product_ids.push(id);
        }
    }

    let (outfit_id,) = sqlx::query_as::<_, (OutfitId,)>(
        r"
        INSERT INTO shop.outfit (title, handle, description, image_url)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (handle) DO UPDATE
        SET title = EXCLUDED.title,
            description = EXCLUDED.description,
            image_url = EXCLUDED.image_url
        RETURNING id
        ",
    )
    .bind(outfit.title.trim())
    .bind(&handle)
    .bind(outfit.description.as_deref())
    .bind(outfit.image_url.as_deref())
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM shop.outfit_product WHERE outfit_id = $1")
        .bind(outfit_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        r"
        INSERT INTO shop.outfit_product (outfit_id, product_id, position)
        SELECT $1, p.id, (p.ord - 1)::int4
        FROM UNNEST($2::int4[]) WITH ORDINALITY AS p(id, ord)
        ",
    )
    .bind(outfit_id)
    .bind(&product_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Key → id map from a two-column query.
async fn lookup<Id>(
    tx: &mut Transaction<'_, Postgres>,
    sql: &'static str,
) -> Result<HashMap<String, Id>, SeedError>
where
    Id: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres> + Send + Unpin,
{
    let rows = sqlx::query_as::<_, (String, Id)>(sql)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r##"
colors:
  - { name: Navy, hex: "#1F2A44" }
  - { name: Sand, hex: "#d8c8a8" }
sizes:
  - { label: S }
  - { label: M }
categories:
  - { name: Shirts }
products:
  - title: Linen Shirt
    category: shirts
    price: "49.00"
    images:
      - { url: /static/img/linen-navy.jpg, alt: Navy }
    variants:
      - { color: Navy, size: M, sku: LIN-NVY-M, stock: 12, image: 0 }
      - { color: Sand, size: M, sku: LIN-SND-M }
outfits:
  - { title: Weekend, products: [linen-shirt] }
"##;

    #[test]
    fn parses_and_validates_sample() {
        let catalog: SeedCatalog = serde_yaml::from_str(CATALOG).unwrap();
        assert_eq!(catalog.products.len(), 1);
        assert!(catalog.products.first().unwrap().is_active);
        assert_eq!(validate_catalog(&catalog), Vec::<String>::new());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_yaml::from_str::<SeedCatalog>("colours: []");
        assert!(result.is_err());
    }

    #[test]
    fn reports_every_problem() {
        let yaml = r##"
colors:
  - { name: Navy, hex: navy }
products:
  - title: Tee
    price: "-1"
    variants:
      - { color: Navy, size: M, sku: TEE-1, stock: -2, image: 3 }
      - { color: Navy, size: M, sku: TEE-1 }
"##;
        let catalog: SeedCatalog = serde_yaml::from_str(yaml).unwrap();
        let errors = validate_catalog(&catalog);
        assert!(errors.iter().any(|e| e.contains("invalid hex")));
        assert!(errors.iter().any(|e| e.contains("price cannot be negative")));
        assert!(errors.iter().any(|e| e.contains("stock cannot be negative")));
        assert!(errors.iter().any(|e| e.contains("image index out of range")));
        assert!(errors.iter().any(|e| e.contains("duplicate SKU")));
        assert!(errors.iter().any(|e| e.contains("listed twice")));
    }

    #[test]
    fn explicit_handles_must_be_valid() {
        assert!(handle_for(Some("Bad Handle"), "x").is_err());
        assert_eq!(handle_for(None, "Linen Shirt").unwrap().as_str(), "linen-shirt");
    }
}
