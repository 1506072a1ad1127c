//! Storefront customer management.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use loomwear_core::{CustomerId, Email};

use super::{RepositoryError, expect_affected};
use crate::models::Customer;

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    email: String,
    name: String,
    is_active: bool,
    order_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email: {e}")))?;
        Ok(Self {
            id: row.id,
            email,
            name: row.name,
            is_active: row.is_active,
            order_count: row.order_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CUSTOMER_SELECT: &str = r#"
    SELECT c.id, c.email, c.name, c.is_active, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM shop."order" o WHERE o.customer_id = c.id) AS order_count
    FROM shop.customer c
"#;

pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest accounts first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Customer>, RepositoryError> {
        sqlx::query_as::<_, CustomerRow>(&format!(
            "{CUSTOMER_SELECT} ORDER BY c.created_at DESC, c.id DESC"
        ))
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Customer::try_from)
        .collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        sqlx::query_as::<_, CustomerRow>(&format!("{CUSTOMER_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Customer::try_from)
            .transpose()
    }

    /// Update profile fields. Deactivated customers can no longer log in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, or `RepositoryError::Conflict` if
    /// the email belongs to another account.
    pub async fn update(
        &self,
        id: CustomerId,
        email: &Email,
        name: &str,
        is_active: bool,
    ) -> Result<Customer, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.customer
            SET email = $2, name = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(email.as_str())
        .bind(name)
        .bind(is_active)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "customer email"))?;
        expect_affected(&result)?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a customer and their saved cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the customer has placed orders.
    pub async fn delete(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.customer WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_delete(e, "customer with orders"))?;
        expect_affected(&result)
    }
}
