//! Cart route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use coffee_hub_core::ProductId;

use crate::cart::repository::SessionCartRepository;
use crate::cart::{CartBackend, CartChoice, CartStore, reconcile};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CartView;
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: u32,
}

/// Update-cart request body; the quantity is absolute, zero deletes.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: u32,
}

/// Remove-from-cart request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
    pub size: String,
}

/// Cart choice resolution body.
#[derive(Debug, Deserialize)]
pub struct CartChoiceRequest {
    pub choice: CartChoice,
}

/// Response carrying the normalized cart view.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: CartView,
}

/// Simple acknowledgment response.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

/// Display the normalized cart view.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartResponse>> {
    let backend = CartBackend::select(&session, state.pool(), user.map(|u| u.id));
    let store = CartStore::new(backend, state.pool());
    let cart = store.view().await?;
    Ok(Json(CartResponse { cart }))
}

/// Add a quantity of the specified variant to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<AckResponse>> {
    let backend = CartBackend::select(&session, state.pool(), user.map(|u| u.id));
    let store = CartStore::new(backend, state.pool());
    store
        .add(request.product_id, &request.size, request.quantity)
        .await?;

    Ok(Json(AckResponse {
        success: true,
        message: "Item added to cart successfully!".to_owned(),
    }))
}

/// Set an absolute quantity for a cart line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<AckResponse>> {
    let backend = CartBackend::select(&session, state.pool(), user.map(|u| u.id));
    let store = CartStore::new(backend, state.pool());
    store
        .update(request.product_id, &request.size, request.quantity)
        .await?;

    Ok(Json(AckResponse {
        success: true,
        message: "Cart updated successfully.".to_owned(),
    }))
}

/// Remove a cart line.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<RemoveFromCartRequest>,
) -> Result<Json<AckResponse>> {
    let backend = CartBackend::select(&session, state.pool(), user.map(|u| u.id));
    let store = CartStore::new(backend, state.pool());
    let removed = store.remove(request.product_id, &request.size).await?;

    if !removed {
        return Err(AppError::NotFound("cart item".to_owned()));
    }

    Ok(Json(AckResponse {
        success: true,
        message: "Item removed from cart successfully.".to_owned(),
    }))
}

/// Both carts' contents, for rendering the post-login choice.
#[derive(Debug, Serialize)]
pub struct CartChoiceView {
    pub session_cart: CartView,
    pub account_cart: CartView,
    pub pending: bool,
}

/// Show both carts so the user can pick a resolution.
#[instrument(skip(state, session))]
pub async fn choice(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartChoiceView>> {
    let session_store = CartStore::new(SessionCartRepository::new(&session), state.pool());
    let session_cart = session_store.view().await?;

    let account_backend = CartBackend::select(&session, state.pool(), Some(user.id));
    let account_store = CartStore::new(account_backend, state.pool());
    let account_cart = account_store.view().await?;

    let pending = reconcile::choice_pending(&session).await?;

    Ok(Json(CartChoiceView {
        session_cart,
        account_cart,
        pending,
    }))
}

/// Resolve the pending cart choice.
#[instrument(skip(state, session))]
pub async fn resolve_choice(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CartChoiceRequest>,
) -> Result<Json<AckResponse>> {
    reconcile::apply_choice(&session, state.pool(), user.id, request.choice).await?;

    Ok(Json(AckResponse {
        success: true,
        message: "Cart choice applied.".to_owned(),
    }))
}
