//! Color CRUD. Colors are shared by every product's variants.

use sqlx::PgPool;

use loomwear_core::ColorId;
use loomwear_core::catalog::Color;

use super::{RepositoryError, expect_affected};

#[derive(sqlx::FromRow)]
struct ColorRow {
    id: ColorId,
    name: String,
    hex: String,
}

impl From<ColorRow> for Color {
    fn from(row: ColorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            hex: row.hex,
        }
    }
}

pub struct ColorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ColorRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Color>, RepositoryError> {
        let rows = sqlx::query_as::<_, ColorRow>(
            "SELECT id, name, hex FROM shop.color ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Color::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ColorId) -> Result<Option<Color>, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRow>("SELECT id, name, hex FROM shop.color WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Color::from))
    }

    /// `hex` must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, name: &str, hex: &str) -> Result<Color, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRow>(
            "INSERT INTO shop.color (name, hex) VALUES ($1, $2) RETURNING id, name, hex",
        )
        .bind(name)
        .bind(hex)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "color name"))?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(&self, id: ColorId, name: &str, hex: &str) -> Result<Color, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRow>(
            "UPDATE shop.color SET name = $2, hex = $3 WHERE id = $1 RETURNING id, name, hex",
        )
        .bind(id)
        .bind(name)
        .bind(hex)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "color name"))?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while variants still use the color.
    pub async fn delete(&self, id: ColorId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.color WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_delete(e, "color"))?;
        expect_affected(&result)
    }
}
