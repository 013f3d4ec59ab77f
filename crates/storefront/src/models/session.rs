//! Session-stored types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coffee_hub_core::{Email, UserId};

use crate::models::user::Role;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Role captured at login; re-read from the database on role-sensitive
    /// admin actions.
    pub role: Role,
}

/// The live checkout state for one session.
///
/// Created when the checkout page is first rendered, replaced whenever the
/// cart total drifts from the intent's recorded amount, and consumed (or
/// simply dropped with the session) at commit. Holding this as one typed
/// record keeps the intent reference and its amount in lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// The payment processor's intent reference.
    pub intent_id: String,
    /// Client-side confirmation secret returned at intent creation.
    pub client_secret: String,
    /// The cart total the intent was created for, in minor units.
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

/// Session keys.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous session cart mapping.
    pub const CART: &str = "cart";

    /// One-shot flag set at login when both the session cart and the
    /// persistent cart are non-empty; consumed by the cart-choice redirect.
    pub const CART_CHOICE_PENDING: &str = "cart_choice_pending";

    /// Key for the live checkout session record.
    pub const CHECKOUT: &str = "checkout_session";
}
