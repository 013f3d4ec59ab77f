//! Order repository.
//!
//! Orders are append-only from the business logic's perspective: created
//! once per successful checkout, never deleted by normal flow. The unique
//! constraint on `payment_reference` is the real idempotency mechanism for
//! duplicate commit triggers.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use coffee_hub_core::{OrderId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::{ContactDetails, Order, OrderLine};

/// Input for creating an order.
pub struct NewOrder<'a> {
    pub user_id: Option<UserId>,
    pub contact: &'a ContactDetails,
    pub payment_reference: &'a str,
}

/// Input for one order line; all fields are commit-time snapshots.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub size: String,
    pub quantity: u32,
}

/// Repository for orders and order lines.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find an order by its payment reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(
            r"
            SELECT id, user_id, order_number, status, full_name, email, phone_number,
                   country, postcode, town_or_city, street_address1, street_address2,
                   county, total, payment_reference, created_at
            FROM orders
            WHERE payment_reference = $1
            ",
        )
        .bind(payment_reference)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Create an order with its lines in a single transaction.
    ///
    /// The order number is generated here, once, and never regenerated. The
    /// order total is recomputed from the inserted lines before the
    /// transaction commits, so `total == SUM(line_total)` holds for every
    /// order this method returns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order with this payment
    /// reference already exists (the caller folds this into the idempotent
    /// already-committed path). Returns `RepositoryError::NotFound` if a
    /// line references a product that vanished mid-commit; the transaction
    /// is rolled back and no partial order survives.
    pub async fn create(
        &self,
        order: NewOrder<'_>,
        lines: &[NewOrderLine],
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_number = Uuid::new_v4().simple().to_string().to_uppercase();
        let contact = order.contact;

        let order_id: OrderId = sqlx::query_scalar(
            r"
            INSERT INTO orders (user_id, order_number, status, full_name, email,
                                phone_number, country, postcode, town_or_city,
                                street_address1, street_address2, county, total,
                                payment_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, $13)
            RETURNING id
            ",
        )
        .bind(order.user_id)
        .bind(&order_number)
        .bind(OrderStatus::Processing)
        .bind(&contact.full_name)
        .bind(&contact.email)
        .bind(&contact.phone_number)
        .bind(&contact.country)
        .bind(&contact.postcode)
        .bind(&contact.town_or_city)
        .bind(&contact.street_address1)
        .bind(&contact.street_address2)
        .bind(&contact.county)
        .bind(order.payment_reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "order for payment reference"))?;

        for line in lines {
            let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
            let line_total = line.unit_price * Decimal::from(line.quantity);
            sqlx::query(
                r"
                INSERT INTO order_line (order_id, product_id, product_name, unit_price,
                                        size, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(&line.size)
            .bind(quantity)
            .bind(line_total)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A vanished product surfaces as an FK violation; rolling the
                // transaction back deletes the order we just inserted.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::NotFound;
                }
                RepositoryError::Database(e)
            })?;
        }

        let created = sqlx::query_as::<_, Order>(
            r"
            UPDATE orders
            SET total = COALESCE(
                (SELECT SUM(line_total) FROM order_line WHERE order_id = $1), 0)
            WHERE id = $1
            RETURNING id, user_id, order_number, status, full_name, email, phone_number,
                      country, postcode, town_or_city, street_address1, street_address2,
                      county, total, payment_reference, created_at
            ",
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Get the lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r"
            SELECT id, order_id, product_id, product_name, unit_price, size,
                   quantity, line_total
            FROM order_line
            WHERE order_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(lines)
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(
            r"
            SELECT id, user_id, order_number, status, full_name, email, phone_number,
                   country, postcode, town_or_city, street_address1, street_address2,
                   county, total, payment_reference, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Update an order's status (admin action).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(status)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
