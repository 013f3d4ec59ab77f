//! Payment processor webhook handler.
//!
//! Verifies the authenticity of inbound asynchronous events, then invokes
//! the order commit pipeline for confirmed payments. The handler never
//! lets an error escape: every path returns a definite accept/reject
//! signal so the processor's retry policy can do its job.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use coffee_hub_core::UserId;

use crate::checkout::{CommitError, CommitOutcome, CommitPipeline, CommitRequest};
use crate::db::{CartEntryRepository, OrderRepository};
use crate::models::{CartSnapshotLine, ContactDetails};
use crate::services::payments;
use crate::state::AppState;

/// Signature header set by the payment processor.
pub const SIGNATURE_HEADER: &str = "payment-signature";

/// How many times to re-check for a synchronously committed order before
/// creating one ourselves.
const EXISTENCE_CHECK_ATTEMPTS: u32 = 5;

/// Fixed delay between existence checks.
const EXISTENCE_CHECK_DELAY: Duration = Duration::from_millis(500);

/// Event envelope; only the type is needed for dispatch.
#[derive(Debug, Deserialize)]
struct Envelope {
    event_type: String,
}

/// The full payload of a `payment_intent.succeeded` event.
#[derive(Debug, Deserialize)]
struct SucceededEvent {
    intent_id: String,
    metadata: EventMetadata,
    shipping: EventShipping,
    billing: EventBilling,
}

#[derive(Debug, Deserialize)]
struct EventMetadata {
    /// JSON-serialized cart snapshot, attached at checkout.
    cart: String,
    #[serde(default)]
    save_info: bool,
    identity: Option<UserId>,
}

#[derive(Debug, Deserialize)]
struct EventShipping {
    name: String,
    phone: String,
    address: EventAddress,
}

#[derive(Debug, Deserialize)]
struct EventAddress {
    line1: String,
    line2: Option<String>,
    city: String,
    country: String,
    postal_code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventBilling {
    email: String,
}

impl SucceededEvent {
    fn contact(&self) -> ContactDetails {
        ContactDetails {
            full_name: self.shipping.name.clone(),
            email: self.billing.email.clone(),
            phone_number: self.shipping.phone.clone(),
            country: self.shipping.address.country.clone(),
            postcode: self.shipping.address.postal_code.clone(),
            town_or_city: self.shipping.address.city.clone(),
            street_address1: self.shipping.address.line1.clone(),
            street_address2: self.shipping.address.line2.clone(),
            county: self.shipping.address.state.clone(),
        }
        .normalized()
    }
}

/// Receive a webhook from the payment processor.
#[instrument(skip(state, headers, body))]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Verify the signature before touching the payload.
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "missing signature header").into_response();
    };

    let secret = state.config().payment.webhook_secret.expose_secret();
    match payments::verify_signature(secret, &body, signature, Utc::now().timestamp()) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("webhook signature verification failed");
            return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
        }
        Err(e) => {
            tracing::warn!("malformed webhook signature header: {e}");
            return (StatusCode::BAD_REQUEST, "malformed signature header").into_response();
        }
    }

    let Ok(envelope) = serde_json::from_slice::<Envelope>(&body) else {
        return (StatusCode::BAD_REQUEST, "malformed payload").into_response();
    };

    match envelope.event_type.as_str() {
        "payment_intent.succeeded" => handle_succeeded(&state, &body).await,
        "payment_intent.payment_failed" => {
            tracing::info!("payment failed event received");
            (
                StatusCode::OK,
                format!("Webhook received: {}", envelope.event_type),
            )
                .into_response()
        }
        // Unrecognized event types are accepted so the processor does not
        // retry deliveries this system never acts on.
        other => (
            StatusCode::OK,
            format!("Unhandled webhook received: {other}"),
        )
            .into_response(),
    }
}

/// Handle `payment_intent.succeeded`: commit the purchase if no matching
/// order exists yet.
async fn handle_succeeded(state: &AppState, body: &Bytes) -> Response {
    let event: SucceededEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("malformed payment_intent.succeeded payload: {e}");
            return (StatusCode::BAD_REQUEST, "malformed payload").into_response();
        }
    };

    let lines: Vec<CartSnapshotLine> = match serde_json::from_str(&event.metadata.cart) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!("malformed cart metadata on intent {}: {e}", event.intent_id);
            return (StatusCode::BAD_REQUEST, "malformed cart metadata").into_response();
        }
    };

    // The synchronous form submit may still be in flight; re-check for its
    // order a few times before creating one here. The unique constraint on
    // the payment reference is the actual correctness mechanism; this loop
    // only smooths latency.
    let orders = OrderRepository::new(state.pool());
    for attempt in 1..=EXISTENCE_CHECK_ATTEMPTS {
        match orders.find_by_payment_reference(&event.intent_id).await {
            Ok(Some(order)) => {
                tracing::info!(
                    order = %order.order_number,
                    attempt,
                    "verified order already in database"
                );
                clear_purchaser_cart(state, event.metadata.identity).await;
                return (
                    StatusCode::OK,
                    "SUCCESS: Verified order already in database".to_owned(),
                )
                    .into_response();
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("webhook existence check failed: {e}");
                return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
            }
        }
        if attempt < EXISTENCE_CHECK_ATTEMPTS {
            tokio::time::sleep(EXISTENCE_CHECK_DELAY).await;
        }
    }

    let pipeline = CommitPipeline::new(state.pool(), state.mailer());
    let request = CommitRequest {
        payment_reference: event.intent_id.clone(),
        contact: event.contact(),
        user_id: event.metadata.identity,
        lines,
        save_info: event.metadata.save_info,
    };

    match pipeline.commit(request).await {
        Ok(CommitOutcome::Created(order)) => {
            tracing::info!(order = %order.order_number, "created order in webhook");
            (
                StatusCode::OK,
                "SUCCESS: Created order in webhook".to_owned(),
            )
                .into_response()
        }
        Ok(CommitOutcome::AlreadyCommitted(order)) => {
            tracing::info!(order = %order.order_number, "order raced ahead of webhook");
            (
                StatusCode::OK,
                "SUCCESS: Verified order already in database".to_owned(),
            )
                .into_response()
        }
        Err(e @ (CommitError::EmptyCart | CommitError::ProductMissing { .. })) => {
            // Nothing retryable here; acknowledge with an error body.
            tracing::error!("webhook commit rejected: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("ERROR: {e}")).into_response()
        }
        Err(e) => {
            // Surface failure so the processor redelivers.
            tracing::error!("webhook commit failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("ERROR: {e}")).into_response()
        }
    }
}

/// Clear the purchaser's persistent cart on the verified-order path.
/// Clearing an empty cart is a no-op, so replays are harmless.
async fn clear_purchaser_cart(state: &AppState, user_id: Option<UserId>) {
    if let Some(user_id) = user_id
        && let Err(e) = CartEntryRepository::new(state.pool()).clear(user_id).await
    {
        tracing::warn!(user = %user_id, "failed to clear cart from webhook: {e}");
    }
}
