//! Outfits: curated, ordered product groupings.

use sqlx::PgPool;

use loomwear_core::catalog::Outfit;
use loomwear_core::{Handle, OutfitId, ProductId};

use super::{RepositoryError, expect_affected, parse_handle};

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

/// Validated fields of an outfit write.
#[derive(Debug, Clone)]
pub struct OutfitInput {
    pub title: String,
    pub handle: Handle,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

const OUTFIT_SELECT: &str = r"
    SELECT o.id, o.title, o.handle, o.description, o.image_url,
           COALESCE(ARRAY_AGG(op.product_id ORDER BY op.position)
                    FILTER (WHERE op.product_id IS NOT NULL), '{}') AS product_ids
    FROM shop.outfit o
    LEFT JOIN shop.outfit_product op ON op.outfit_id = o.id
";

/// Drop repeated ids, keeping each one's first position.
fn dedup_in_order(ids: &[ProductId]) -> Vec<ProductId> {
    let mut unique: Vec<ProductId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    unique
}

pub struct OutfitRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OutfitRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Outfit>, RepositoryError> {
        sqlx::query_as::<_, OutfitRow>(&format!("{OUTFIT_SELECT} GROUP BY o.id ORDER BY o.title, o.id"))
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Outfit::try_from)
            .collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OutfitId) -> Result<Option<Outfit>, RepositoryError> {
        sqlx::query_as::<_, OutfitRow>(&format!("{OUTFIT_SELECT} WHERE o.id = $1 GROUP BY o.id"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Outfit::try_from)
            .transpose()
    }

    /// Create an outfit and its product list in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the handle is taken and
    /// `RepositoryError::InvalidReference` for an unknown product.
    pub async fn create(
        &self,
        input: &OutfitInput,
        products: &[ProductId],
    ) -> Result<Outfit, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,) = sqlx::query_as::<_, (OutfitId,)>(
            r"
            INSERT INTO shop.outfit (title, handle, description, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(&input.title)
        .bind(&input.handle)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "outfit handle"))?;

        insert_products(&mut tx, id, products).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update an outfit's own fields; its product list is left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(&self, id: OutfitId, input: &OutfitInput) -> Result<Outfit, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.outfit
            SET title = $2, handle = $3, description = $4, image_url = $5
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.handle)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "outfit handle"))?;
        expect_affected(&result)?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace the outfit's ordered product list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown outfit and
    /// `RepositoryError::InvalidReference` for an unknown product.
    pub async fn set_products(
        &self,
        id: OutfitId,
        products: &[ProductId],
    ) -> Result<Outfit, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_as::<_, (OutfitId,)>("SELECT id FROM shop.outfit WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM shop.outfit_product WHERE outfit_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        insert_products(&mut tx, id, products).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the outfit does not exist.
    pub async fn delete(&self, id: OutfitId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.outfit WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_affected(&result)
    }
}

async fn insert_products(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    outfit: OutfitId,
    products: &[ProductId],
) -> Result<(), RepositoryError> {
    let products = dedup_in_order(products);
    if products.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r"
        INSERT INTO shop.outfit_product (outfit_id, product_id, position)
        SELECT $1, p.id, (p.ord - 1)::int4
        FROM UNNEST($2::int4[]) WITH ORDINALITY AS p(id, ord)
        ",
    )
    .bind(outfit)
    .bind(&products)
    .execute(&mut **tx)
    .await
    .map_err(|e| RepositoryError::from_write(e, "outfit product"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_products_keep_first_position() {
        let ids = [3, 1, 3, 2, 1].map(ProductId::new);
        assert_eq!(dedup_in_order(&ids), [3, 1, 2].map(ProductId::new).to_vec());
    }
}
