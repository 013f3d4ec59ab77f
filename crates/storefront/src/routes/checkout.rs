//! Checkout route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::repository::SessionCartRepository;
use crate::cart::{CartBackend, CartRepository, CartStore};
use crate::checkout::{CheckoutOrchestrator, CommitPipeline, CommitRequest};
use crate::db::UserRepository;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::{CartView, ContactDetails, UserProfile};
use crate::state::AppState;

/// Data the checkout page renders against.
#[derive(Debug, Serialize)]
pub struct CheckoutData {
    pub cart: CartView,
    pub client_secret: String,
    pub public_key: String,
    /// Stored defaults to prefill the order form, when authenticated.
    pub form_defaults: UserProfile,
}

/// Body for re-attaching intent metadata before client-side confirmation.
#[derive(Debug, Deserialize)]
pub struct CacheCheckoutRequest {
    #[serde(default)]
    pub save_info: bool,
}

/// The order form submission.
#[derive(Debug, Deserialize)]
pub struct OrderSubmission {
    #[serde(flatten)]
    pub contact: ContactDetails,
    #[serde(default)]
    pub save_info: bool,
}

/// Response for a committed order.
#[derive(Debug, Serialize)]
pub struct OrderCommitted {
    pub order_number: String,
    pub total: rust_decimal::Decimal,
    /// False when the order had already been committed by a racing trigger.
    pub created: bool,
}

/// Checkout entry: validate the cart and ensure a live payment intent.
#[instrument(skip(state, session))]
pub async fn entry(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CheckoutData>> {
    let user_id = user.map(|u| u.id);
    let backend = CartBackend::select(&session, state.pool(), user_id);
    let store = CartStore::new(backend, state.pool());
    let cart = store.view().await?;

    let orchestrator = CheckoutOrchestrator::new(
        state.payments(),
        &session,
        state.config().payment.currency,
    );
    let checkout = orchestrator.prepare(&cart, false, user_id).await?;

    let form_defaults = match user_id {
        Some(user_id) => UserRepository::new(state.pool()).profile(user_id).await?,
        None => UserProfile::default(),
    };

    Ok(Json(CheckoutData {
        cart,
        client_secret: checkout.client_secret,
        public_key: state.payments().public_key().to_owned(),
        form_defaults,
    }))
}

/// Re-attach intent metadata (cart snapshot, save-info flag, identity)
/// right before the client confirms payment.
#[instrument(skip(state, session))]
pub async fn cache(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CacheCheckoutRequest>,
) -> Result<Json<serde_json::Value>> {
    let user_id = user.map(|u| u.id);
    let backend = CartBackend::select(&session, state.pool(), user_id);
    let store = CartStore::new(backend, state.pool());
    let cart = store.view().await?;

    let orchestrator = CheckoutOrchestrator::new(
        state.payments(),
        &session,
        state.config().payment.currency,
    );
    orchestrator
        .refresh_metadata(&cart, request.save_info, user_id)
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Commit the cart into an order after the client confirmed payment.
#[instrument(skip(state, session, submission))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(submission): Json<OrderSubmission>,
) -> Result<Json<OrderCommitted>> {
    let user_id = user.map(|u| u.id);
    let backend = CartBackend::select(&session, state.pool(), user_id);
    let store = CartStore::new(backend, state.pool());
    let cart = store.view().await?;

    let orchestrator = CheckoutOrchestrator::new(
        state.payments(),
        &session,
        state.config().payment.currency,
    );
    let checkout = orchestrator
        .current()
        .await?
        .ok_or_else(|| crate::checkout::CheckoutError::NoActiveCheckout)?;

    let pipeline = CommitPipeline::new(state.pool(), state.mailer());
    let outcome = pipeline
        .commit(CommitRequest {
            payment_reference: checkout.intent_id,
            contact: submission.contact,
            user_id,
            lines: cart.snapshot(),
            save_info: submission.save_info,
        })
        .await?;

    // The pipeline cleared the persistent cart; the session-scoped side is
    // ours to clear, along with the consumed checkout record.
    SessionCartRepository::new(&session).clear().await?;
    orchestrator.consume().await?;

    let created = matches!(outcome, crate::checkout::CommitOutcome::Created(_));
    let order = outcome.order();

    Ok(Json(OrderCommitted {
        order_number: order.order_number.clone(),
        total: order.total,
        created,
    }))
}
