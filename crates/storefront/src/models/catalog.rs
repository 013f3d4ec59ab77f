//! Catalog models: products and their purchasable variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use coffee_hub_core::{ProductId, VariantId};

/// A product in the catalog.
///
/// Products are not purchasable themselves; every purchase goes through one
/// of the product's [`Variant`]s.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchasable size/price/stock combination of a product.
///
/// `(product_id, size)` is unique. Stock never goes below zero; the only
/// mutation paths are admin edits and the order commit decrement.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub size: String,
    pub unit_price: Decimal,
    pub stock_count: i32,
    pub active: bool,
}

impl Variant {
    /// Stock as an unsigned count (the column is CHECK-constrained >= 0).
    #[must_use]
    pub fn stock(&self) -> u32 {
        u32::try_from(self.stock_count).unwrap_or(0)
    }
}
