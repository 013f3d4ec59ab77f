//! Payment processor client.
//!
//! Small request/response contract over the processor's HTTP API: create an
//! intent, retrieve it, attach metadata, and verify inbound webhook
//! signatures. The processor's internals are opaque to this crate.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use coffee_hub_core::UserId;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

/// Request timeout for processor calls; external calls surface failure
/// rather than hang.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted age of a webhook signature timestamp.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The referenced intent does not exist upstream (or has expired).
    #[error("payment intent not found: {0}")]
    IntentNotFound(String),

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors parsing a webhook signature header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// No `t=` element in the header.
    #[error("signature header missing timestamp")]
    MissingTimestamp,
    /// No `v1=` element in the header.
    #[error("signature header missing signature")]
    MissingSignature,
}

/// A freshly created payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// The retrievable summary of an existing intent.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentSummary {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
}

/// Metadata attached to an intent so an asynchronous webhook can commit the
/// purchase without the originating session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMetadata {
    /// JSON-serialized cart snapshot.
    pub cart: String,
    /// Whether to save the shipping details onto the user's profile.
    pub save_info: bool,
    /// The purchasing user, if authenticated.
    pub identity: Option<UserId>,
}

/// HTTP client for the payment processor.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    base_url: String,
    public_key: String,
}

impl PaymentClient {
    /// Create a new payment processor client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Parse(format!("invalid secret key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            public_key: config.public_key.clone(),
        })
    }

    /// The publishable key the payment UI needs.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Create a payment intent for `amount` minor units.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the request fails or the response cannot be
    /// parsed.
    pub async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        let body = serde_json::json!({ "amount": amount, "currency": currency });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }

    /// Retrieve an intent's summary by its reference.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::IntentNotFound` for a 404 so callers can
    /// distinguish "expired upstream" from hard failures.
    pub async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSummary, PaymentError> {
        let url = format!("{}/v1/payment_intents/{intent_id}", self.base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::IntentNotFound(intent_id.to_owned()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<IntentSummary>()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }

    /// Attach commit metadata to an intent.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the request fails.
    pub async fn attach_metadata(
        &self,
        intent_id: &str,
        metadata: &IntentMetadata,
    ) -> Result<(), PaymentError> {
        let url = format!("{}/v1/payment_intents/{intent_id}/metadata", self.base_url);

        let response = self.client.post(&url).json(metadata).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::IntentNotFound(intent_id.to_owned()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Verify a webhook signature header of the form `t=<unix>,v1=<hex>`.
///
/// The signed payload is `<timestamp>.<body>`, HMAC-SHA256 under the shared
/// webhook secret. Signatures older than the tolerance window are rejected
/// to blunt replay of captured deliveries.
///
/// Returns `Ok(false)` for a well-formed header that doesn't verify.
///
/// # Errors
///
/// Returns `SignatureError` when the header itself is malformed.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now_unix: i64,
) -> Result<bool, SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut provided: Option<&str> = None;

    for part in signature_header.split(',') {
        if let Some(value) = part.strip_prefix("t=") {
            timestamp = value.parse().ok();
        } else if let Some(value) = part.strip_prefix("v1=") {
            provided = Some(value);
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let provided = provided.ok_or(SignatureError::MissingSignature)?;

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Ok(false);
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return Ok(false);
    };
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    // Constant-time enough for our purposes: both sides are fixed-length
    // hex digests.
    Ok(expected.as_bytes() == provided.as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_5f2a9c1d8e3b7a6f";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"event_type":"payment_intent.succeeded"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now);

        assert_eq!(verify_signature(SECRET, payload, &header, now), Ok(true));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = br#"{"event_type":"payment_intent.succeeded"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, "wrong_secret", now);

        assert_eq!(verify_signature(SECRET, payload, &header, now), Ok(false));
    }

    #[test]
    fn modified_payload_is_rejected() {
        let payload = br#"{"event_type":"payment_intent.succeeded"}"#;
        let tampered = br#"{"event_type":"payment_intent.succeeded","x":1}"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now);

        assert_eq!(verify_signature(SECRET, tampered, &header, now), Ok(false));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now - 600);

        assert_eq!(verify_signature(SECRET, payload, &header, now), Ok(false));
    }

    #[test]
    fn malformed_headers_error() {
        let payload = b"{}";
        assert_eq!(
            verify_signature(SECRET, payload, "v1=abcdef", 0),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(SECRET, payload, "t=12345", 0),
            Err(SignatureError::MissingSignature)
        );
        assert_eq!(
            verify_signature(SECRET, payload, "garbage", 0),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(SECRET, payload, "", 0),
            Err(SignatureError::MissingTimestamp)
        );
    }
}
