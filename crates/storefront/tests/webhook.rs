//! Webhook endpoint tests: signature verification and event dispatch.
//!
//! These drive the real router with `tower::ServiceExt::oneshot`. The pool
//! is lazily connected and never touched: every path exercised here rejects
//! or acknowledges before reaching the database.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use coffee_hub_core::CurrencyCode;
use coffee_hub_storefront::config::{PaymentConfig, StorefrontConfig};
use coffee_hub_storefront::routes;
use coffee_hub_storefront::state::AppState;

const WEBHOOK_SECRET: &str = "whsec_test_9c4e1b7a2d8f";

fn test_state() -> AppState {
    let config = StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/unused"),
        host: "127.0.0.1".parse().expect("valid host"),
        port: 3000,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("x".repeat(32)),
        payment: PaymentConfig {
            api_url: "https://pay.invalid".to_owned(),
            public_key: "pk_test".to_owned(),
            secret_key: SecretString::from("sk_test"),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            currency: CurrencyCode::USD,
        },
        email: None,
        sentry_dsn: None,
    };

    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .expect("lazy pool");

    AppState::new(config, pool).expect("app state")
}

fn app() -> Router {
    routes::routes().with_state(test_state())
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

fn webhook_request(payload: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/checkout/wh")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("payment-signature", signature);
    }
    builder
        .body(Body::from(payload.to_vec()))
        .expect("request")
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let payload = br#"{"event_type":"payment_intent.succeeded"}"#;

    let response = app()
        .oneshot(webhook_request(payload, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_signature_is_rejected_without_side_effects() {
    let payload = br#"{"event_type":"payment_intent.succeeded"}"#;
    let header = sign(payload, "wrong_secret", now_unix());

    let response = app()
        .oneshot(webhook_request(payload, Some(&header)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_signature_header_is_rejected() {
    let payload = br#"{"event_type":"payment_intent.succeeded"}"#;

    let response = app()
        .oneshot(webhook_request(payload, Some("garbage")))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_signature_is_rejected() {
    let payload = br#"{"event_type":"payment_intent.succeeded"}"#;
    let header = sign(payload, WEBHOOK_SECRET, now_unix() - 600);

    let response = app()
        .oneshot(webhook_request(payload, Some(&header)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let payload = b"not json at all";
    let header = sign(payload, WEBHOOK_SECRET, now_unix());

    let response = app()
        .oneshot(webhook_request(payload, Some(&header)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unrecognized_event_types_are_accepted_without_side_effects() {
    // The processor must not be made to retry event types we don't act on.
    let payload = br#"{"event_type":"charge.refund.updated","intent_id":"pi_1"}"#;
    let header = sign(payload, WEBHOOK_SECRET, now_unix());

    let response = app()
        .oneshot(webhook_request(payload, Some(&header)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn payment_failed_is_acknowledged() {
    let payload = br#"{"event_type":"payment_intent.payment_failed","intent_id":"pi_1"}"#;
    let header = sign(payload, WEBHOOK_SECRET, now_unix());

    let response = app()
        .oneshot(webhook_request(payload, Some(&header)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn succeeded_event_with_malformed_cart_metadata_is_rejected() {
    // Structurally valid event whose cart metadata is not a snapshot list.
    let payload = serde_json::json!({
        "event_type": "payment_intent.succeeded",
        "intent_id": "pi_123",
        "amount": 1500,
        "metadata": { "cart": "not-a-cart", "save_info": false, "identity": null },
        "shipping": {
            "name": "Ada Lovelace",
            "phone": "555-0100",
            "address": {
                "line1": "1 Analytical Way",
                "line2": null,
                "city": "London",
                "country": "GB",
                "postal_code": "N1 9GU",
                "state": null
            }
        },
        "billing": { "email": "ada@example.com" }
    });
    let payload = serde_json::to_vec(&payload).expect("payload");
    let header = sign(&payload, WEBHOOK_SECRET, now_unix());

    let response = app()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn succeeded_event_missing_shipping_is_rejected() {
    let payload = serde_json::json!({
        "event_type": "payment_intent.succeeded",
        "intent_id": "pi_123",
        "amount": 1500,
        "metadata": { "cart": "[]", "save_info": false, "identity": null }
    });
    let payload = serde_json::to_vec(&payload).expect("payload");
    let header = sign(&payload, WEBHOOK_SECRET, now_unix());

    let response = app()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
