//! Read-only catalog queries.
//!
//! Listing queries are built with `QueryBuilder` because the filter shape
//! varies per request; everything user-supplied goes through `push_bind`.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use loomwear_core::catalog::{
    Category, Color, Outfit, Product, ProductFilter, ProductImage, ProductSummary, Size, Variant,
};
use loomwear_core::{
    CategoryId, ColorId, CurrencyCode, Handle, ImageId, Money, OutfitId, ProductId, SizeId,
    VariantId,
};

use super::{RepositoryError, to_count};

/// Store currency. Every catalog price is in this currency.
pub const STORE_CURRENCY: CurrencyCode = CurrencyCode::USD;

pub(super) fn parse_handle(value: &str) -> Result<Handle, RepositoryError> {
    Handle::parse(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid handle {value:?}: {e}")))
}

fn money(amount: Decimal) -> Money {
    Money::new(amount, STORE_CURRENCY)
}

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
struct CategoryRow {
    id: CategoryId,
    name: String,
    handle: String,
    description: Option<String>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            handle: parse_handle(&row.handle)?,
            description: row.description,
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
struct ProductRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    title: String,
    handle: String,
    description: String,
    price: Decimal,
    is_active: bool,
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

#[derive(sqlx::FromRow)]
struct OutfitRow {
    id: OutfitId,
    title: String,
    handle: String,
    description: Option<String>,
    image_url: Option<String>,
    product_ids: Vec<ProductId>,
}

impl TryFrom<OutfitRow> for Outfit {
    type Error = RepositoryError;

    fn try_from(row: OutfitRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            handle: parse_handle(&row.handle)?,
            description: row.description,
            image_url: row.image_url,
            product_ids: row.product_ids,
        })
    }
}

/// Everything the cart and checkout need to know about one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDetail {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_handle: Handle,
    /// `Color / Size`
    pub label: String,
    pub sku: String,
    pub stock: u32,
    pub price: Money,
    pub image_url: Option<String>,
    /// Inactive products cannot be bought even if stock remains.
    pub is_active: bool,
}

#[derive(sqlx::FromRow)]
struct VariantDetailRow {
    variant_id: VariantId,
    product_id: ProductId,
    product_title: String,
    product_handle: String,
    color_name: String,
    size_label: String,
    sku: String,
    stock: i32,
    price: Decimal,
    image_url: Option<String>,
    is_active: bool,
}

impl TryFrom<VariantDetailRow> for VariantDetail {
    type Error = RepositoryError;

    fn try_from(row: VariantDetailRow) -> Result<Self, Self::Error> {
        Ok(Self {
            variant_id: row.variant_id,
            product_id: row.product_id,
            product_title: row.product_title,
            product_handle: parse_handle(&row.product_handle)?,
            label: format!("{} / {}", row.color_name, row.size_label),
            sku: row.sku,
            stock: to_count(row.stock, "stock")?,
            price: money(row.price),
            image_url: row.image_url,
            is_active: row.is_active,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

const SUMMARY_COLUMNS: &str = r"
    SELECT p.id, p.category_id, p.title, p.handle, p.price, p.is_active,
           (SELECT i.url FROM shop.product_image i
             WHERE i.product_id = p.id
             ORDER BY i.position, i.id LIMIT 1) AS image_url,
           COALESCE((SELECT SUM(v.stock) FROM shop.variant v
                      WHERE v.product_id = p.id), 0)::int8 AS total_stock
    FROM shop.product p
";

const OUTFIT_SELECT: &str = r"
    SELECT o.id, o.title, o.handle, o.description, o.image_url,
           COALESCE(ARRAY_AGG(op.product_id ORDER BY op.position)
                    FILTER (WHERE op.product_id IS NOT NULL), '{}') AS product_ids
    FROM shop.outfit o
    LEFT JOIN shop.outfit_product op ON op.outfit_id = o.id
";

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, handle, description FROM shop.category ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Category::try_from)
        .collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_by_handle(
        &self,
        handle: &Handle,
    ) -> Result<Option<Category>, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, handle, description FROM shop.category WHERE handle = $1",
        )
        .bind(handle.as_str())
        .fetch_optional(self.pool)
        .await?
        .map(Category::try_from)
        .transpose()
    }

    /// Product listing for a filter, at most `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        limit: i64,
    ) -> Result<Vec<ProductSummary>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(SUMMARY_COLUMNS);
        qb.push(" WHERE TRUE");

        if !filter.include_inactive {
            qb.push(" AND p.is_active");
        }
        if let Some(category) = filter.category {
            qb.push(" AND p.category_id = ").push_bind(category);
        }
        if filter.color.is_some() || filter.size.is_some() || filter.in_stock_only {
            qb.push(" AND EXISTS (SELECT 1 FROM shop.variant fv WHERE fv.product_id = p.id");
            if let Some(color) = filter.color {
                qb.push(" AND fv.color_id = ").push_bind(color);
            }
            if let Some(size) = filter.size {
                qb.push(" AND fv.size_id = ").push_bind(size);
            }
            if filter.in_stock_only {
                qb.push(" AND fv.stock > 0");
            }
            qb.push(")");
        }
        if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
            let pattern = like_pattern(query.trim());
            qb.push(" AND (p.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY ").push(filter.sort.order_by());
        qb.push(" LIMIT ").push_bind(limit);

        qb.build_query_as::<ProductSummaryRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(ProductSummary::try_from)
            .collect()
    }

    /// Active products by id, in the order the ids were given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<ProductSummary>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("{SUMMARY_COLUMNS} WHERE p.is_active AND p.id = ANY($1)");
        let rows = sqlx::query_as::<_, ProductSummaryRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool)
            .await?;

        let mut products = rows
            .into_iter()
            .map(ProductSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(products)
    }

    /// A product with its images and variants. Inactive products are hidden.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn product_by_handle(
        &self,
        handle: &Handle,
    ) -> Result<Option<Product>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, category_id, title, handle, description, price, is_active
            FROM shop.product
            WHERE handle = $1 AND is_active
            ",
        )
        .bind(handle.as_str())
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let images = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, product_id, url, alt, position
            FROM shop.product_image
            WHERE product_id = $1
            ORDER BY position, id
            ",
        )
        .bind(row.id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(ProductImage::from)
        .collect();

        let variants = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT v.id, v.product_id, v.image_id, v.sku, v.stock,
                   c.id AS color_id, c.name AS color_name, c.hex AS color_hex,
                   s.id AS size_id, s.label AS size_label, s.sort_order AS size_sort_order
            FROM shop.variant v
            JOIN shop.color c ON c.id = v.color_id
            JOIN shop.size s ON s.id = v.size_id
            WHERE v.product_id = $1
            ORDER BY v.id
            ",
        )
        .bind(row.id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Variant::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Product {
            id: row.id,
            category_id: row.category_id,
            title: row.title,
            handle: parse_handle(&row.handle)?,
            description: row.description,
            price: money(row.price),
            is_active: row.is_active,
            images,
            variants,
        }))
    }

    /// All outfits, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_outfits(&self) -> Result<Vec<Outfit>, RepositoryError> {
        let sql = format!("{OUTFIT_SELECT} GROUP BY o.id ORDER BY o.created_at DESC, o.id DESC");
        sqlx::query_as::<_, OutfitRow>(&sql)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Outfit::try_from)
            .collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn outfit_by_handle(&self, handle: &Handle) -> Result<Option<Outfit>, RepositoryError> {
        let sql = format!("{OUTFIT_SELECT} WHERE o.handle = $1 GROUP BY o.id");
        sqlx::query_as::<_, OutfitRow>(&sql)
            .bind(handle.as_str())
            .fetch_optional(self.pool)
            .await?
            .map(Outfit::try_from)
            .transpose()
    }

    /// All colors and sizes, for collection filters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn facets(&self) -> Result<(Vec<Color>, Vec<Size>), RepositoryError> {
        let colors = sqlx::query_as::<_, (ColorId, String, String)>(
            "SELECT id, name, hex FROM shop.color ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|(id, name, hex)| Color { id, name, hex })
        .collect();

        let sizes = sqlx::query_as::<_, (SizeId, String, i32)>(
            "SELECT id, label, sort_order FROM shop.size ORDER BY sort_order, id",
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|(id, label, sort_order)| Size {
            id,
            label,
            sort_order,
        })
        .collect();

        Ok((colors, sizes))
    }

    /// Cart/checkout details for a set of variants. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant_details(
        &self,
        ids: &[VariantId],
    ) -> Result<Vec<VariantDetail>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, VariantDetailRow>(
            r"
            SELECT v.id AS variant_id, v.sku, v.stock,
                   p.id AS product_id, p.title AS product_title, p.handle AS product_handle,
                   p.price, p.is_active,
                   c.name AS color_name, s.label AS size_label,
                   COALESCE(vi.url, (SELECT i.url FROM shop.product_image i
                                      WHERE i.product_id = p.id
                                      ORDER BY i.position, i.id LIMIT 1)) AS image_url
            FROM shop.variant v
            JOIN shop.product p ON p.id = v.product_id
            JOIN shop.color c ON c.id = v.color_id
            JOIN shop.size s ON s.id = v.size_id
            LEFT JOIN shop.product_image vi ON vi.id = v.image_id
            WHERE v.id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(VariantDetail::try_from)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("linen"), "%linen%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn corrupt_handles_are_reported() {
        let row = CategoryRow {
            id: CategoryId::new(1),
            name: "Tops".to_owned(),
            handle: "Not A Handle".to_owned(),
            description: None,
        };
        assert!(matches!(
            Category::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn variant_detail_builds_label() {
        let row = VariantDetailRow {
            variant_id: VariantId::new(9),
            product_id: ProductId::new(2),
            product_title: "Linen Shirt".to_owned(),
            product_handle: "linen-shirt".to_owned(),
            color_name: "Sand".to_owned(),
            size_label: "M".to_owned(),
            sku: "LS-SAND-M".to_owned(),
            stock: 4,
            price: Decimal::new(4500, 2),
            image_url: None,
            is_active: true,
        };
        let detail = VariantDetail::try_from(row).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(detail.label, "Sand / M");
        assert_eq!(detail.price.to_string(), "$45.00");
        assert_eq!(detail.stock, 4);
    }
}
