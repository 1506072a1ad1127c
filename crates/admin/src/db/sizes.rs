//! Size CRUD.

use sqlx::PgPool;

use loomwear_core::SizeId;
use loomwear_core::catalog::Size;

use super::{RepositoryError, expect_affected};

#[derive(sqlx::FromRow)]
struct SizeRow {
    id: SizeId,
    label: String,
    sort_order: i32,
}

impl From<SizeRow> for Size {
    fn from(row: SizeRow) -> Self {
        Self {
            id: row.id,
            label: row.label,
            sort_order: row.sort_order,
        }
    }
}

pub struct SizeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SizeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Sizes smallest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Size>, RepositoryError> {
        let rows = sqlx::query_as::<_, SizeRow>(
            "SELECT id, label, sort_order FROM shop.size ORDER BY sort_order, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Size::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: SizeId) -> Result<Option<Size>, RepositoryError> {
        let row = sqlx::query_as::<_, SizeRow>(
            "SELECT id, label, sort_order FROM shop.size WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Size::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the label is taken.
    pub async fn create(&self, label: &str, sort_order: i32) -> Result<Size, RepositoryError> {
        let row = sqlx::query_as::<_, SizeRow>(
            r"
            INSERT INTO shop.size (label, sort_order)
            VALUES ($1, $2)
            RETURNING id, label, sort_order
            ",
        )
        .bind(label)
        .bind(sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "size label"))?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: SizeId,
        label: &str,
        sort_order: i32,
    ) -> Result<Size, RepositoryError> {
        let row = sqlx::query_as::<_, SizeRow>(
            r"
            UPDATE shop.size SET label = $2, sort_order = $3
            WHERE id = $1
            RETURNING id, label, sort_order
            ",
        )
        .bind(id)
        .bind(label)
        .bind(sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "size label"))?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while variants still use the size.
    pub async fn delete(&self, id: SizeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.size WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_delete(e, "size"))?;
        expect_affected(&result)
    }
}
