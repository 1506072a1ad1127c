//! Products with their images and variants.
//!
//! Deleting a product cascades to its images, variants, saved cart lines and
//! outfit memberships; order lines keep their snapshot with the variant set
//! to `NULL`.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use loomwear_core::catalog::{Color, Product, ProductImage, ProductSummary, Size, Variant};
use loomwear_core::{CategoryId, ColorId, Handle, ImageId, ProductId, SizeId, VariantId};

use super::{RepositoryError, expect_affected, money, parse_handle, to_count};

/// Escape `%`, `_` and `\` so user text matches literally inside `ILIKE`.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    title: String,
    handle: String,
    description: String,
    price: Decimal,
    is_active: bool,
}

impl ProductRow {
    fn into_product(
        self,
        images: Vec<ProductImage>,
        variants: Vec<Variant>,
    ) -> Result<Product, RepositoryError> {
        Ok(Product {
            id: self.id,
            category_id: self.category_id,
            title: self.title,
            handle: parse_handle(&self.handle)?,
            description: self.description,
            price: money(self.price),
            is_active: self.is_active,
            images,
            variants,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductSummaryRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    title: String,
    handle: String,
    price: Decimal,
    is_active: bool,
    image_url: Option<String>,
    total_stock: i64,
}

impl TryFrom<ProductSummaryRow> for ProductSummary {
    type Error = RepositoryError;

    fn try_from(row: ProductSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            category_id: row.category_id,
            title: row.title,
            handle: parse_handle(&row.handle)?,
            price: money(row.price),
            image_url: row.image_url,
            total_stock: row.total_stock,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: ImageId,
    product_id: ProductId,
    url: String,
    alt: String,
    position: i32,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            url: row.url,
            alt: row.alt,
            position: row.position,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    image_id: Option<ImageId>,
    sku: String,
    stock: i32,
    color_id: ColorId,
    color_name: String,
    color_hex: String,
    size_id: SizeId,
    size_label: String,
    size_sort_order: i32,
}

impl TryFrom<VariantRow> for Variant {
    type Error = RepositoryError;

    fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            color: Color {
                id: row.color_id,
                name: row.color_name,
                hex: row.color_hex,
            },
            size: Size {
                id: row.size_id,
                label: row.size_label,
                sort_order: row.size_sort_order,
            },
            image_id: row.image_id,
            sku: row.sku,
            stock: to_count(row.stock, "stock")?,
        })
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Validated fields of a product write.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub title: String,
    pub handle: Handle,
    pub description: String,
    /// Non-negative.
    pub price: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct ImageInput {
    pub url: String,
    pub alt: String,
    /// `None` appends after the last image.
    pub position: Option<i32>,
}

/// Validated fields of a variant write.
#[derive(Debug, Clone)]
pub struct VariantInput {
    pub color_id: ColorId,
    pub size_id: SizeId,
    pub image_id: Option<ImageId>,
    pub sku: String,
    /// Non-negative.
    pub stock: i32,
}

// =============================================================================
// Repository
// =============================================================================

const SUMMARY_SELECT: &str = r"
    SELECT p.id, p.category_id, p.title, p.handle, p.price, p.is_active,
           (SELECT i.url FROM shop.product_image i
             WHERE i.product_id = p.id
             ORDER BY i.position, i.id LIMIT 1) AS image_url,
           COALESCE((SELECT SUM(v.stock) FROM shop.variant v
                      WHERE v.product_id = p.id), 0)::int8 AS total_stock
    FROM shop.product p
    WHERE TRUE
";

const PRODUCT_COLUMNS: &str = "id, category_id, title, handle, description, price, is_active";

const VARIANT_SELECT: &str = r"
    SELECT v.id, v.product_id, v.image_id, v.sku, v.stock,
           c.id AS color_id, c.name AS color_name, c.hex AS color_hex,
           s.id AS size_id, s.label AS size_label, s.sort_order AS size_sort_order
    FROM shop.variant v
    JOIN shop.color c ON c.id = v.color_id
    JOIN shop.size s ON s.id = v.size_id
";

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every product, active or not, optionally narrowed by category and a
    /// title search.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category: Option<CategoryId>,
        query: Option<&str>,
    ) -> Result<Vec<ProductSummary>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(SUMMARY_SELECT);
        if let Some(category) = category {
            qb.push(" AND p.category_id = ").push_bind(category);
        }
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            qb.push(" AND p.title ILIKE ").push_bind(like_pattern(query));
        }
        qb.push(" ORDER BY p.title, p.id");

        qb.build_query_as::<ProductSummaryRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(ProductSummary::try_from)
            .collect()
    }

    /// A product with its images and variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let images = self.images(id).await?;
        let variants = sqlx::query_as::<_, VariantRow>(&format!(
            "{VARIANT_SELECT} WHERE v.product_id = $1 ORDER BY c.name, s.sort_order, v.id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Variant::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        row.into_product(images, variants).map(Some)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the handle is taken and
    /// `RepositoryError::InvalidReference` for an unknown category.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product (category_id, title, handle, description, price, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.category_id)
        .bind(&input.title)
        .bind(&input.handle)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product handle"))?;

        row.into_product(Vec::new(), Vec::new())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, `RepositoryError::Conflict` or
    /// `RepositoryError::InvalidReference`.
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.product
            SET category_id = $2, title = $3, handle = $4, description = $5,
                price = $6, is_active = $7, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.category_id)
        .bind(&input.title)
        .bind(&input.handle)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.is_active)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product handle"))?;
        expect_affected(&result)?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_delete(e, "product"))?;
        expect_affected(&result)
    }

    // -------------------------------------------------------------------------
    // Images
    // -------------------------------------------------------------------------

    /// A product's images in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, product: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, product_id, url, alt, position
            FROM shop.product_image
            WHERE product_id = $1
            ORDER BY position, id
            ",
        )
        .bind(product)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(ProductImage::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_image(
        &self,
        product: ProductId,
        input: &ImageInput,
    ) -> Result<ProductImage, RepositoryError> {
        let row = sqlx::query_as::<_, ImageRow>(
            r"
            INSERT INTO shop.product_image (product_id, url, alt, position)
            VALUES ($1, $2, $3, COALESCE($4, (
                SELECT COALESCE(MAX(position) + 1, 0)
                FROM shop.product_image WHERE product_id = $1
            )))
            RETURNING id, product_id, url, alt, position
            ",
        )
        .bind(product)
        .bind(&input.url)
        .bind(&input.alt)
        .bind(input.position)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match RepositoryError::from_write(e, "image") {
            RepositoryError::InvalidReference(_) => RepositoryError::NotFound,
            other => other,
        })?;
        Ok(row.into())
    }

    /// Variants showing this image fall back to the lead image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not exist.
    pub async fn delete_image(&self, id: ImageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product_image WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_affected(&result)
    }

    // -------------------------------------------------------------------------
    // Variants
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant(&self, id: VariantId) -> Result<Option<Variant>, RepositoryError> {
        sqlx::query_as::<_, VariantRow>(&format!("{VARIANT_SELECT} WHERE v.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Variant::try_from)
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a duplicate SKU or color × size,
    /// `RepositoryError::InvalidReference` for an unknown color or size.
    pub async fn create_variant(
        &self,
        product: ProductId,
        input: &VariantInput,
    ) -> Result<Variant, RepositoryError> {
        let (id,) = sqlx::query_as::<_, (VariantId,)>(
            r"
            INSERT INTO shop.variant (product_id, color_id, size_id, image_id, sku, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(product)
        .bind(input.color_id)
        .bind(input.size_id)
        .bind(input.image_id)
        .bind(&input.sku)
        .bind(input.stock)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "variant (SKU or color and size)"))?;

        self.variant(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Same as [`Self::create_variant`], plus `RepositoryError::NotFound`.
    pub async fn update_variant(
        &self,
        id: VariantId,
        input: &VariantInput,
    ) -> Result<Variant, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.variant
            SET color_id = $2, size_id = $3, image_id = $4, sku = $5, stock = $6
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.color_id)
        .bind(input.size_id)
        .bind(input.image_id)
        .bind(&input.sku)
        .bind(input.stock)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "variant (SKU or color and size)"))?;
        expect_affected(&result)?;

        self.variant(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.variant WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_affected(&result)
    }

    /// Add `delta` units (negative removes), clamping at zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn adjust_stock(&self, id: VariantId, delta: i32) -> Result<Variant, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.variant
            SET stock = LEAST(GREATEST(stock::int8 + $2, 0), 2147483647)::int4
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(i64::from(delta))
        .execute(self.pool)
        .await?;
        expect_affected(&result)?;

        self.variant(id).await?.ok_or(RepositoryError::NotFound)
    }
}
