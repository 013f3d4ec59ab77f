//! Public catalog route handlers.
//!
//! Non-admins never see inactive inventory; these handlers always query
//! active products and variants only.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::{Product, Variant};
use crate::state::AppState;

/// A product with its purchasable variants.
#[derive(Debug, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}

/// List active products with their active variants.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<ProductWithVariants>>> {
    let catalog = ProductRepository::new(state.pool());
    let products = catalog.list_products(false).await?;

    let mut listing = Vec::with_capacity(products.len());
    for product in products {
        let variants = catalog.variants_of(product.id, false).await?;
        listing.push(ProductWithVariants { product, variants });
    }

    Ok(Json(listing))
}

/// Show one active product by slug.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductWithVariants>> {
    let catalog = ProductRepository::new(state.pool());
    let product = catalog
        .product_by_slug(&slug)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let variants = catalog.variants_of(product.id, false).await?;

    Ok(Json(ProductWithVariants { product, variants }))
}
