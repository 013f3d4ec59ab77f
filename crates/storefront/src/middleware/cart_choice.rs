//! Post-login cart-choice redirect.
//!
//! When login leaves both carts non-empty, the reconciler sets a one-shot
//! session flag; this middleware forces the next page loads through the
//! explicit cart choice until the flag is consumed.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::session_keys;

/// Paths exempt from the redirect: the choice flow itself, auth, health,
/// and the webhook (which has no session to reconcile).
const EXEMPT_PREFIXES: &[&str] = &["/cart/choice", "/auth/", "/health", "/checkout/wh"];

/// Redirect GET requests to the cart choice endpoint while a choice is
/// pending.
pub async fn cart_choice_redirect(session: Session, request: Request, next: Next) -> Response {
    if request.method() == Method::GET {
        let path = request.uri().path().to_owned();
        let exempt = EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix));

        if !exempt {
            let pending = session
                .get::<bool>(session_keys::CART_CHOICE_PENDING)
                .await
                .ok()
                .flatten()
                .unwrap_or(false);
            if pending {
                return Redirect::to("/cart/choice").into_response();
            }
        }
    }

    next.run(request).await
}
