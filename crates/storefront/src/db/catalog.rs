//! Inventory ledger repository.
//!
//! Read by every other component; mutated only by admin edits and by the
//! order commit stock decrement.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;

use coffee_hub_core::{ProductId, VariantId};

use super::RepositoryError;
use crate::models::{Product, Variant};

/// Repository for products and their variants.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            SELECT id, name, slug, description, category, active, created_at, updated_at
            FROM product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            SELECT id, name, slug, description, category, active, created_at, updated_at
            FROM product
            WHERE slug = $1
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// List products, optionally including inactive ones.
    ///
    /// Non-admin callers must pass `include_inactive = false`; the policy
    /// layer decides, this repository obeys.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(
            r"
            SELECT id, name, slug, description, category, active, created_at, updated_at
            FROM product
            WHERE active OR $1
            ORDER BY name ASC
            ",
        )
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// List a product's variants, optionally including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants_of(
        &self,
        product_id: ProductId,
        include_inactive: bool,
    ) -> Result<Vec<Variant>, RepositoryError> {
        let variants = sqlx::query_as::<_, Variant>(
            r"
            SELECT id, product_id, size, unit_price, stock_count, active
            FROM product_variant
            WHERE product_id = $1 AND (active OR $2)
            ORDER BY size ASC
            ",
        )
        .bind(product_id)
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(variants)
    }

    /// Look up an active variant by `(product, size)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant(
        &self,
        product_id: ProductId,
        size: &str,
    ) -> Result<Option<Variant>, RepositoryError> {
        let variant = sqlx::query_as::<_, Variant>(
            r"
            SELECT id, product_id, size, unit_price, stock_count, active
            FROM product_variant
            WHERE product_id = $1 AND size = $2 AND active
            ",
        )
        .bind(product_id)
        .bind(size)
        .fetch_optional(self.pool)
        .await?;

        Ok(variant)
    }

    /// Batch-resolve active variants plus their product names for a set of
    /// cart keys.
    ///
    /// Carts are small, so this resolves key by key rather than building an
    /// array-typed query. Keys with no matching active variant are simply
    /// absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn resolve_cart_keys(
        &self,
        keys: &[(ProductId, String)],
    ) -> Result<HashMap<(ProductId, String), (Variant, String, String)>, RepositoryError> {
        let mut resolved = HashMap::with_capacity(keys.len());
        for (product_id, size) in keys {
            let row = sqlx::query_as::<_, VariantWithProduct>(
                r"
                SELECT v.id, v.product_id, v.size, v.unit_price, v.stock_count, v.active,
                       p.name AS product_name, p.slug AS product_slug
                FROM product_variant v
                JOIN product p ON p.id = v.product_id
                WHERE v.product_id = $1 AND v.size = $2 AND v.active AND p.active
                ",
            )
            .bind(*product_id)
            .bind(size)
            .fetch_optional(self.pool)
            .await?;

            if let Some(row) = row {
                resolved.insert(
                    (*product_id, size.clone()),
                    (row.variant(), row.product_name, row.product_slug),
                );
            }
        }
        Ok(resolved)
    }

    /// Decrement a variant's stock, flooring at zero.
    ///
    /// Single-row atomic update; two racing decrements serialize on the row
    /// and neither can drive the count negative.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn decrement_stock(
        &self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE product_variant
            SET stock_count = GREATEST(stock_count - $3, 0)
            WHERE product_id = $1 AND size = $2
            ",
        )
        .bind(product_id)
        .bind(size)
        .bind(i32::try_from(quantity).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Update a variant's price, stock, or active flag (admin edit).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_variant(
        &self,
        id: VariantId,
        unit_price: Option<Decimal>,
        stock_count: Option<i32>,
        active: Option<bool>,
    ) -> Result<Variant, RepositoryError> {
        let variant = sqlx::query_as::<_, Variant>(
            r"
            UPDATE product_variant
            SET unit_price = COALESCE($2, unit_price),
                stock_count = COALESCE($3, stock_count),
                active = COALESCE($4, active)
            WHERE id = $1
            RETURNING id, product_id, size, unit_price, stock_count, active
            ",
        )
        .bind(id)
        .bind(unit_price)
        .bind(stock_count)
        .bind(active)
        .fetch_optional(self.pool)
        .await?;

        variant.ok_or(RepositoryError::NotFound)
    }
}

/// Join row for [`ProductRepository::resolve_cart_keys`].
#[derive(sqlx::FromRow)]
struct VariantWithProduct {
    id: VariantId,
    product_id: ProductId,
    size: String,
    unit_price: Decimal,
    stock_count: i32,
    active: bool,
    product_name: String,
    product_slug: String,
}

impl VariantWithProduct {
    fn variant(&self) -> Variant {
        Variant {
            id: self.id,
            product_id: self.product_id,
            size: self.size.clone(),
            unit_price: self.unit_price,
            stock_count: self.stock_count,
            active: self.active,
        }
    }
}
