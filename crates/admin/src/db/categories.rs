//! Category CRUD.

use sqlx::PgPool;

use loomwear_core::catalog::Category;
use loomwear_core::{CategoryId, Handle};

use super::{RepositoryError, expect_affected, parse_handle};

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

/// Validated fields of a category write.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub handle: Handle,
    pub description: Option<String>,
}

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, handle, description FROM shop.category ORDER BY name, id",
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
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, handle, description FROM shop.category WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Category::try_from)
        .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the handle is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO shop.category (name, handle, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, handle, description
            ",
        )
        .bind(&input.name)
        .bind(&input.handle)
        .bind(input.description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category handle"))?;

        Category::try_from(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist and
    /// `RepositoryError::Conflict` if the new handle is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            UPDATE shop.category
            SET name = $2, handle = $3, description = $4
            WHERE id = $1
            RETURNING id, name, handle, description
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.handle)
        .bind(input.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category handle"))?
        .ok_or(RepositoryError::NotFound)?;

        Category::try_from(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products still belong to the
    /// category.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_delete(e, "category"))?;
        expect_affected(&result)
    }
}
