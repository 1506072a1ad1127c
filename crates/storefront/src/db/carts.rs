//! Saved carts of logged-in customers.
//!
//! A cart is stored as ordered `shop.cart_line` rows and always written
//! whole: the state machine in `loomwear_core::cart` decides the lines, this
//! repository only persists them.

use sqlx::{PgConnection, PgPool};

use loomwear_core::cart::{Cart, CartLine};
use loomwear_core::{CustomerId, VariantId};

use super::{RepositoryError, to_column, to_count};

/// Repository for customer carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a customer's cart (empty if they never saved one).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self, customer: CustomerId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, (VariantId, i32)>(
            r"
            SELECT variant_id, quantity
            FROM shop.cart_line
            WHERE customer_id = $1
            ORDER BY position
            ",
        )
        .bind(customer)
        .fetch_all(self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(|(variant_id, quantity)| {
                Ok(CartLine {
                    variant_id,
                    quantity: to_count(quantity, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Cart::from_lines(lines))
    }

    /// Replace a customer's saved cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn save(&self, customer: CustomerId, cart: &Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        replace_lines(&mut tx, customer, cart).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Delete and re-insert a customer's cart lines on an open connection.
pub(crate) async fn replace_lines(
    conn: &mut PgConnection,
    customer: CustomerId,
    cart: &Cart,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.cart_line WHERE customer_id = $1")
        .bind(customer)
        .execute(&mut *conn)
        .await?;

    if cart.is_empty() {
        return Ok(());
    }

    let variant_ids: Vec<VariantId> = cart.lines().iter().map(|l| l.variant_id).collect();
    let quantities: Vec<i32> = cart.lines().iter().map(|l| to_column(l.quantity)).collect();
    let positions: Vec<i32> = (0..).take(cart.len()).collect();

    sqlx::query(
        r"
        INSERT INTO shop.cart_line (customer_id, variant_id, quantity, position)
        SELECT $1, * FROM UNNEST($2::int4[], $3::int4[], $4::int4[])
        ",
    )
    .bind(customer)
    .bind(&variant_ids)
    .bind(&quantities)
    .bind(&positions)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
