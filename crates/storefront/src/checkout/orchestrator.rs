//! Checkout orchestrator.
//!
//! Keeps at most one live payment intent per session and keeps that
//! intent's amount in sync with the live cart total. The intent reference
//! and amount live together in a typed [`CheckoutSession`] record with an
//! explicit lifecycle: created at checkout entry, replaced on amount drift,
//! consumed at commit.

use chrono::Utc;
use thiserror::Error;
use tower_sessions::Session;

use coffee_hub_core::{CurrencyCode, UserId};

use crate::models::session_keys;
use crate::models::{CartView, CheckoutSession};
use crate::services::payments::{IntentMetadata, PaymentClient, PaymentError};

/// Errors from checkout preparation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has nothing purchasable in it.
    #[error("there's nothing in your cart at the moment")]
    EmptyCart,

    /// No checkout session exists for this request.
    #[error("no active checkout")]
    NoActiveCheckout,

    /// The cart total cannot be represented in minor units.
    #[error("cart total out of range")]
    AmountOverflow,

    /// Payment processor call failed; not retried automatically.
    #[error("payment processor error: {0}")]
    Processor(#[from] PaymentError),

    /// Session store failure.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Cart snapshot serialization failed.
    #[error("metadata serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Whether a stored checkout session is still usable for the live total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredIntentCheck {
    /// No stored intent, or the processor no longer knows it.
    Missing,
    /// The intent exists upstream but was created for a different total
    /// (stock clamp or item removal changed the cart between page loads).
    AmountMismatch { stored: i64, live: i64 },
    /// The intent matches the live total and can be reused.
    Valid,
}

/// Decide whether a stored intent can be reused for the live cart total.
///
/// `retrieved_amount` is `None` when the stored reference could not be
/// retrieved upstream (expired/invalid), which is treated the same as "does
/// not exist".
#[must_use]
pub fn check_stored_intent(
    stored: Option<&CheckoutSession>,
    retrieved_amount: Option<i64>,
    live_amount: i64,
) -> StoredIntentCheck {
    match (stored, retrieved_amount) {
        (None, _) | (Some(_), None) => StoredIntentCheck::Missing,
        (Some(_), Some(amount)) if amount == live_amount => StoredIntentCheck::Valid,
        (Some(_), Some(amount)) => StoredIntentCheck::AmountMismatch {
            stored: amount,
            live: live_amount,
        },
    }
}

/// Orchestrates checkout entry for one request.
pub struct CheckoutOrchestrator<'a> {
    payments: &'a PaymentClient,
    session: &'a Session,
    currency: CurrencyCode,
}

impl<'a> CheckoutOrchestrator<'a> {
    /// Create an orchestrator over the request's session.
    #[must_use]
    pub const fn new(
        payments: &'a PaymentClient,
        session: &'a Session,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            payments,
            session,
            currency,
        }
    }

    /// Ensure a live payment intent exists for the cart view and return the
    /// checkout session to render against.
    ///
    /// Reuses the stored intent only if its recorded amount still matches
    /// the freshly computed total; otherwise creates a new intent and
    /// replaces the session's stored reference. Enough metadata is attached
    /// to the intent for a later webhook to commit without the session.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty view and
    /// `CheckoutError::Processor` for processor failures other than "not
    /// found" (which is handled by creating a fresh intent).
    pub async fn prepare(
        &self,
        view: &CartView,
        save_info: bool,
        user_id: Option<UserId>,
    ) -> Result<CheckoutSession, CheckoutError> {
        if view.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let live_amount = cart_total_minor(view, self.currency)?;

        let stored = self
            .session
            .get::<CheckoutSession>(session_keys::CHECKOUT)
            .await?;

        let retrieved_amount = match &stored {
            Some(checkout) => match self.payments.retrieve_intent(&checkout.intent_id).await {
                Ok(summary) => Some(summary.amount),
                Err(PaymentError::IntentNotFound(_)) => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let checkout = match check_stored_intent(stored.as_ref(), retrieved_amount, live_amount) {
            StoredIntentCheck::Valid => {
                // Unwrap is safe by construction but spelled as a branch.
                match stored {
                    Some(checkout) => checkout,
                    None => return Err(CheckoutError::NoActiveCheckout),
                }
            }
            StoredIntentCheck::Missing => self.create_checkout(live_amount).await?,
            StoredIntentCheck::AmountMismatch { stored, live } => {
                tracing::info!(stored, live, "cart total drifted, replacing payment intent");
                self.create_checkout(live_amount).await?
            }
        };

        self.attach_metadata(&checkout, view, save_info, user_id)
            .await?;

        Ok(checkout)
    }

    /// Re-attach metadata to the live intent right before the client
    /// confirms payment.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NoActiveCheckout` if no checkout session
    /// exists.
    pub async fn refresh_metadata(
        &self,
        view: &CartView,
        save_info: bool,
        user_id: Option<UserId>,
    ) -> Result<CheckoutSession, CheckoutError> {
        let checkout = self
            .session
            .get::<CheckoutSession>(session_keys::CHECKOUT)
            .await?
            .ok_or(CheckoutError::NoActiveCheckout)?;

        self.attach_metadata(&checkout, view, save_info, user_id)
            .await?;

        Ok(checkout)
    }

    /// The checkout session stored for this request, if any.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Session` on session store failures.
    pub async fn current(&self) -> Result<Option<CheckoutSession>, CheckoutError> {
        Ok(self
            .session
            .get::<CheckoutSession>(session_keys::CHECKOUT)
            .await?)
    }

    /// Drop the stored checkout session (called after a successful commit).
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Session` on session store failures.
    pub async fn consume(&self) -> Result<(), CheckoutError> {
        self.session
            .remove::<CheckoutSession>(session_keys::CHECKOUT)
            .await?;
        Ok(())
    }

    async fn create_checkout(&self, amount: i64) -> Result<CheckoutSession, CheckoutError> {
        let intent = self
            .payments
            .create_intent(amount, self.currency.code())
            .await?;

        let checkout = CheckoutSession {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_minor: amount,
            created_at: Utc::now(),
        };
        self.session
            .insert(session_keys::CHECKOUT, &checkout)
            .await?;

        Ok(checkout)
    }

    async fn attach_metadata(
        &self,
        checkout: &CheckoutSession,
        view: &CartView,
        save_info: bool,
        user_id: Option<UserId>,
    ) -> Result<(), CheckoutError> {
        let metadata = IntentMetadata {
            cart: serde_json::to_string(&view.snapshot())?,
            save_info,
            identity: user_id,
        };
        self.payments
            .attach_metadata(&checkout.intent_id, &metadata)
            .await?;
        Ok(())
    }
}

/// The cart total in minor units.
///
/// # Errors
///
/// Returns `CheckoutError::AmountOverflow` if the total does not fit.
pub fn cart_total_minor(view: &CartView, currency: CurrencyCode) -> Result<i64, CheckoutError> {
    use coffee_hub_core::Price;

    Price::new(view.total, currency)
        .to_minor_units()
        .ok_or(CheckoutError::AmountOverflow)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn checkout(amount: i64) -> CheckoutSession {
        CheckoutSession {
            intent_id: "pi_123".into(),
            client_secret: "pi_123_secret".into(),
            amount_minor: amount,
            created_at: Utc::now(),
        }
    }

    fn view(total: &str) -> CartView {
        CartView {
            lines: Vec::new(),
            total: total.parse().unwrap(),
            adjustments: Vec::new(),
        }
    }

    #[test]
    fn stored_intent_with_matching_amount_is_reused() {
        let stored = checkout(1500);
        assert_eq!(
            check_stored_intent(Some(&stored), Some(1500), 1500),
            StoredIntentCheck::Valid
        );
    }

    #[test]
    fn drifted_amount_forces_a_new_intent() {
        let stored = checkout(1500);
        assert_eq!(
            check_stored_intent(Some(&stored), Some(1500), 1000),
            StoredIntentCheck::AmountMismatch {
                stored: 1500,
                live: 1000
            }
        );
    }

    #[test]
    fn missing_or_expired_intents_create_fresh() {
        let stored = checkout(1500);
        assert_eq!(check_stored_intent(None, None, 1500), StoredIntentCheck::Missing);
        // Upstream retrieval failed: same as "does not exist".
        assert_eq!(
            check_stored_intent(Some(&stored), None, 1500),
            StoredIntentCheck::Missing
        );
    }

    #[test]
    fn totals_convert_to_minor_units() {
        let usd = CurrencyCode::USD;
        assert_eq!(cart_total_minor(&view("15.00"), usd).unwrap(), 1500);
        assert_eq!(cart_total_minor(&view("0.01"), usd).unwrap(), 1);
    }

    #[test]
    fn empty_view_total_is_zero_minor_units() {
        let empty = CartView {
            lines: Vec::new(),
            total: Decimal::ZERO,
            adjustments: Vec::new(),
        };
        assert_eq!(cart_total_minor(&empty, CurrencyCode::USD).unwrap(), 0);
    }
}
