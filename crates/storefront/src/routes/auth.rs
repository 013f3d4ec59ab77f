//! Authentication route handlers.
//!
//! Login is the cart reconciler's hook: the moment an anonymous session
//! becomes authenticated, the session cart and the persistent cart are
//! reconciled, possibly deferring to an explicit user choice.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::{ReconcileOutcome, reconcile};
use crate::error::Result;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    /// True when both carts had items and the user must resolve the
    /// pending cart choice before normal cart behavior resumes.
    pub cart_choice_required: bool,
}

/// Create a new account.
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>> {
    let auth = AuthService::new(state.pool());
    let user = auth
        .register_with_password(&request.email, &request.password)
        .await?;

    tracing::info!(user = %user.id, "account created");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Login and reconcile carts.
#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let auth = AuthService::new(state.pool());
    let user = auth
        .login_with_password(&request.email, &request.password)
        .await?;

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    };
    set_current_user(&session, &current).await?;

    // The one-shot reconciliation hook: runs exactly once per login.
    let outcome = reconcile::on_login(&session, state.pool(), user.id).await?;

    Ok(Json(LoginResponse {
        success: true,
        cart_choice_required: outcome == ReconcileOutcome::ChoiceRequired,
    }))
}

/// Logout and destroy the session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<serde_json::Value>> {
    clear_current_user(&session).await?;
    session.flush().await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
