//! Account route handlers: stored checkout defaults and order history.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::db::{OrderRepository, UserRepository};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Order, UserProfile};
use crate::state::AppState;

/// Get the current user's stored checkout defaults.
#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserProfile>> {
    let profile = UserRepository::new(state.pool()).profile(user.id).await?;
    Ok(Json(profile))
}

/// Replace the current user's stored checkout defaults.
#[instrument(skip(state, profile))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(profile): Json<UserProfile>,
) -> Result<Json<serde_json::Value>> {
    UserRepository::new(state.pool())
        .save_profile(user.id, &profile)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Order history response.
#[derive(Debug, Serialize)]
pub struct OrderHistory {
    pub orders: Vec<Order>,
}

/// List the current user's orders, newest first.
#[instrument(skip(state))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrderHistory>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(OrderHistory { orders }))
}
