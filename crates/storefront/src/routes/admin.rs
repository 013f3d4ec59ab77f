//! Admin route handlers, gated by the role capability table.

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use coffee_hub_core::{OrderId, OrderStatus, VariantId};

use crate::db::{OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Variant};
use crate::policy::{Action, permits};
use crate::routes::catalog::ProductWithVariants;
use crate::state::AppState;

/// Reject unless the user's role permits `action`.
fn require_action(user: &CurrentUser, action: Action) -> Result<()> {
    if permits(user.role, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role {} may not perform this action",
            user.role.as_str()
        )))
    }
}

/// Variant update body; absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateVariantRequest {
    pub unit_price: Option<Decimal>,
    pub stock_count: Option<i32>,
    pub active: Option<bool>,
}

/// Order status update body.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// List all products including inactive inventory.
#[instrument(skip(state))]
pub async fn products(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<ProductWithVariants>>> {
    require_action(&user, Action::ViewInactiveInventory)?;

    let catalog = ProductRepository::new(state.pool());
    let products = catalog.list_products(true).await?;

    let mut listing = Vec::with_capacity(products.len());
    for product in products {
        let variants = catalog.variants_of(product.id, true).await?;
        listing.push(ProductWithVariants { product, variants });
    }

    Ok(Json(listing))
}

/// Update a variant's price, stock, or active flag.
#[instrument(skip(state, request))]
pub async fn update_variant(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Json(request): Json<UpdateVariantRequest>,
) -> Result<Json<Variant>> {
    require_action(&user, Action::EditInventory)?;

    if request.stock_count.is_some_and(|stock| stock < 0) {
        return Err(AppError::Validation(
            "stock count cannot be negative".to_owned(),
        ));
    }
    if request.unit_price.is_some_and(|price| price < Decimal::ZERO) {
        return Err(AppError::Validation(
            "unit price cannot be negative".to_owned(),
        ));
    }

    let variant = ProductRepository::new(state.pool())
        .update_variant(
            VariantId::new(id),
            request.unit_price,
            request.stock_count,
            request.active,
        )
        .await?;

    Ok(Json(variant))
}

/// Change an order's status.
#[instrument(skip(state, request))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<serde_json::Value>> {
    require_action(&user, Action::ManageOrders)?;

    OrderRepository::new(state.pool())
        .update_status(OrderId::new(id), request.status)
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
