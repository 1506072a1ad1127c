//! Cached catalog reads.
//!
//! Category lists, category pages, product pages and outfits are cached with
//! `moka` for `CATALOG_CACHE_TTL_SECS`. Free-text searches, carts, checkout
//! and orders always go to the database.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use loomwear_core::Handle;
use loomwear_core::catalog::{Category, Color, Outfit, Product, ProductFilter, ProductSummary, Size};

use crate::db::{CatalogRepository, RepositoryError};

/// Cache key, one variant per request shape.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Category(Handle),
    Products { filter: ProductFilter, limit: i64 },
    Product(Handle),
    Outfits,
    Outfit(Handle),
    Facets,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Vec<Category>),
    Category(Category),
    Products(Vec<ProductSummary>),
    Product(Box<Product>),
    Outfits(Vec<Outfit>),
    Outfit(Box<OutfitDetail>),
    Facets(Facets),
}

/// An outfit with the products it is made of.
#[derive(Debug, Clone)]
pub struct OutfitDetail {
    pub outfit: Outfit,
    pub products: Vec<ProductSummary>,
}

/// Every color and size, for listing filters.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub colors: Vec<Color>,
    pub sizes: Vec<Size>,
}

/// Catalog read service with a TTL cache in front of `PostgreSQL`.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    pool: PgPool,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner { pool, cache }),
        }
    }

    fn repo(&self) -> CatalogRepository<'_> {
        CatalogRepository::new(&self.inner.pool)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = self.repo().list_categories().await?;
        self.inner
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn category(&self, handle: &Handle) -> Result<Option<Category>, RepositoryError> {
        let key = CacheKey::Category(handle.clone());
        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for category");
            return Ok(Some(category));
        }

        let category = self.repo().category_by_handle(handle).await?;
        if let Some(category) = &category {
            self.inner
                .cache
                .insert(key, CacheValue::Category(category.clone()))
                .await;
        }
        Ok(category)
    }

    /// Product listing. Searches (filters with a text query) bypass the cache.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self))]
    pub async fn products(
        &self,
        filter: &ProductFilter,
        limit: i64,
    ) -> Result<Vec<ProductSummary>, RepositoryError> {
        let cacheable = filter.query.is_none();
        let key = CacheKey::Products {
            filter: filter.clone(),
            limit,
        };

        if cacheable && let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products = self.repo().list_products(filter, limit).await?;
        if cacheable {
            self.inner
                .cache
                .insert(key, CacheValue::Products(products.clone()))
                .await;
        }
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn product(&self, handle: &Handle) -> Result<Option<Product>, RepositoryError> {
        let key = CacheKey::Product(handle.clone());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let product = self.repo().product_by_handle(handle).await?;
        if let Some(product) = &product {
            self.inner
                .cache
                .insert(key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    pub async fn outfits(&self) -> Result<Vec<Outfit>, RepositoryError> {
        if let Some(CacheValue::Outfits(outfits)) = self.inner.cache.get(&CacheKey::Outfits).await
        {
            debug!("Cache hit for outfits");
            return Ok(outfits);
        }

        let outfits = self.repo().list_outfits().await?;
        self.inner
            .cache
            .insert(CacheKey::Outfits, CacheValue::Outfits(outfits.clone()))
            .await;
        Ok(outfits)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if a database query fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn outfit(&self, handle: &Handle) -> Result<Option<OutfitDetail>, RepositoryError> {
        let key = CacheKey::Outfit(handle.clone());
        if let Some(CacheValue::Outfit(detail)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for outfit");
            return Ok(Some(*detail));
        }

        let repo = self.repo();
        let Some(outfit) = repo.outfit_by_handle(handle).await? else {
            return Ok(None);
        };
        let products = repo.products_by_ids(&outfit.product_ids).await?;
        let detail = OutfitDetail { outfit, products };

        self.inner
            .cache
            .insert(key, CacheValue::Outfit(Box::new(detail.clone())))
            .await;
        Ok(Some(detail))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if a database query fails.
    pub async fn facets(&self) -> Result<Facets, RepositoryError> {
        if let Some(CacheValue::Facets(facets)) = self.inner.cache.get(&CacheKey::Facets).await {
            return Ok(facets);
        }

        let (colors, sizes) = self.repo().facets().await?;
        let facets = Facets { colors, sizes };
        self.inner
            .cache
            .insert(CacheKey::Facets, CacheValue::Facets(facets.clone()))
            .await;
        Ok(facets)
    }

    /// Drop a cached product page, e.g. after its stock changed.
    pub async fn invalidate_product(&self, handle: &Handle) {
        self.inner
            .cache
            .invalidate(&CacheKey::Product(handle.clone()))
            .await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loomwear_core::{CurrencyCode, Money, ProductId};

    use super::*;

    fn service() -> CatalogService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://loomwear@localhost/loomwear_unused")
            .unwrap();
        CatalogService::new(pool, Duration::from_secs(300))
    }

    fn product(handle: &Handle) -> Product {
        Product {
            id: ProductId::new(1),
            category_id: None,
            title: "Linen Shirt".to_owned(),
            handle: handle.clone(),
            description: String::new(),
            price: Money::from_cents(4500, CurrencyCode::USD),
            is_active: true,
            images: Vec::new(),
            variants: Vec::new(),
        }
    }

    #[tokio::test]
    async fn invalidating_a_product_only_drops_that_page() {
        let catalog = service();
        let shirt = Handle::parse("linen-shirt").unwrap();
        let coat = Handle::parse("wool-coat").unwrap();
        for handle in [&shirt, &coat] {
            catalog
                .inner
                .cache
                .insert(
                    CacheKey::Product(handle.clone()),
                    CacheValue::Product(Box::new(product(handle))),
                )
                .await;
        }

        catalog.invalidate_product(&shirt).await;

        let cache = &catalog.inner.cache;
        assert!(cache.get(&CacheKey::Product(shirt)).await.is_none());
        assert!(cache.get(&CacheKey::Product(coat)).await.is_some());
    }
}
