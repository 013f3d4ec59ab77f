//! Persistent cart repository.
//!
//! One row per `(user, product, size)`; rows exist only while the line is in
//! the cart and are deleted on quantity-zero updates, explicit clears, and
//! successful order commits.

use sqlx::PgPool;

use coffee_hub_core::{ProductId, UserId};

use super::RepositoryError;

/// A persistent cart line as stored.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CartEntry {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: i32,
}

/// Repository for authenticated users' cart entries.
pub struct CartEntryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartEntryRepository<'a> {
    /// Create a new cart entry repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's cart entries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, CartEntry>(
            r"
            SELECT product_id, size, quantity
            FROM cart_entry
            WHERE user_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }

    /// Add `quantity` to the entry for `(user, product, size)`, creating it
    /// if absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cart_entry (user_id, product_id, size, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id, size)
            DO UPDATE SET quantity = cart_entry.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(size)
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Set the absolute quantity for `(user, product, size)`.
    ///
    /// A quantity of zero deletes the row. Returns `false` if the row was
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let result = if quantity == 0 {
            sqlx::query(
                r"
                DELETE FROM cart_entry
                WHERE user_id = $1 AND product_id = $2 AND size = $3
                ",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(size)
            .execute(self.pool)
            .await?
        } else {
            sqlx::query(
                r"
                UPDATE cart_entry
                SET quantity = $4, updated_at = NOW()
                WHERE user_id = $1 AND product_id = $2 AND size = $3
                ",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(size)
            .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
            .execute(self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    /// Remove the entry for `(user, product, size)`.
    ///
    /// Returns `false` if the row was absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_entry
            WHERE user_id = $1 AND product_id = $2 AND size = $3
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(size)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all of a user's cart entries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_entry WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }
}
