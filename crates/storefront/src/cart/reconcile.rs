//! Cart reconciliation at login.
//!
//! Runs exactly once, synchronously, when an anonymous session becomes an
//! authenticated one. Auto-merges only when at most one side has items;
//! otherwise the user is forced through an explicit three-way choice on
//! their next request.

use std::collections::BTreeMap;

use serde::Deserialize;
use sqlx::PgPool;
use tower_sessions::Session;

use coffee_hub_core::{ProductId, UserId};

use super::CartError;
use crate::db::{CartEntryRepository, ProductRepository};
use crate::models::SessionCart;
use crate::models::session_keys;

/// What reconciliation decided at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Session cart was empty; nothing to do.
    NoOp,
    /// Session cart was transferred into the empty persistent cart.
    Transferred,
    /// Both carts had items; the pending-choice flag was set.
    ChoiceRequired,
}

/// The user's resolution when both carts had items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartChoice {
    /// Additive combine of quantities, clamped to stock per line.
    Merge,
    /// Keep only the persistent cart; discard the session cart.
    KeepAccount,
    /// Replace the persistent cart with the session cart's contents.
    KeepSession,
}

/// Reconcile the session cart with the user's persistent cart at login.
///
/// # Errors
///
/// Returns `CartError::Repository`/`CartError::Session` on storage
/// failures.
pub async fn on_login(
    session: &Session,
    pool: &PgPool,
    user_id: UserId,
) -> Result<ReconcileOutcome, CartError> {
    let session_cart = session
        .get::<SessionCart>(session_keys::CART)
        .await?
        .unwrap_or_default();

    if session_cart.is_empty() {
        return Ok(ReconcileOutcome::NoOp);
    }

    let entries = CartEntryRepository::new(pool);
    let has_persistent = !entries.list(user_id).await?.is_empty();

    if has_persistent {
        session.insert(session_keys::CART_CHOICE_PENDING, true).await?;
        tracing::debug!(user = %user_id, "both carts non-empty, deferring to cart choice");
        return Ok(ReconcileOutcome::ChoiceRequired);
    }

    transfer(&session_cart, pool, user_id).await?;
    session.remove::<SessionCart>(session_keys::CART).await?;
    tracing::debug!(user = %user_id, "transferred session cart to account");
    Ok(ReconcileOutcome::Transferred)
}

/// True when the login left a pending cart choice to resolve.
///
/// # Errors
///
/// Returns `CartError::Session` on session store failures.
pub async fn choice_pending(session: &Session) -> Result<bool, CartError> {
    Ok(session
        .get::<bool>(session_keys::CART_CHOICE_PENDING)
        .await?
        .unwrap_or(false))
}

/// Apply the user's cart choice and consume the one-shot flag.
///
/// Whichever choice is made, the session cart is cleared unconditionally
/// afterward and normal cart behavior resumes.
///
/// # Errors
///
/// Returns `CartError::Repository`/`CartError::Session` on storage
/// failures.
pub async fn apply_choice(
    session: &Session,
    pool: &PgPool,
    user_id: UserId,
    choice: CartChoice,
) -> Result<(), CartError> {
    let session_cart = session
        .get::<SessionCart>(session_keys::CART)
        .await?
        .unwrap_or_default();

    match choice {
        CartChoice::Merge => merge(&session_cart, pool, user_id).await?,
        CartChoice::KeepAccount => {}
        CartChoice::KeepSession => {
            CartEntryRepository::new(pool).clear(user_id).await?;
            transfer(&session_cart, pool, user_id).await?;
        }
    }

    session.remove::<SessionCart>(session_keys::CART).await?;
    session
        .remove::<bool>(session_keys::CART_CHOICE_PENDING)
        .await?;
    tracing::debug!(user = %user_id, ?choice, "cart choice applied");
    Ok(())
}

/// Copy session lines into the persistent cart, skipping lines whose
/// variant no longer exists.
async fn transfer(
    session_cart: &SessionCart,
    pool: &PgPool,
    user_id: UserId,
) -> Result<(), CartError> {
    let catalog = ProductRepository::new(pool);
    let entries = CartEntryRepository::new(pool);

    for (product, size, quantity) in session_cart.lines() {
        if catalog.variant(product, size).await?.is_none() {
            continue;
        }
        entries.add(user_id, product, size, quantity).await?;
    }
    Ok(())
}

/// Additively merge session lines into the persistent cart, clamping each
/// combined quantity to the variant's stock.
async fn merge(
    session_cart: &SessionCart,
    pool: &PgPool,
    user_id: UserId,
) -> Result<(), CartError> {
    let catalog = ProductRepository::new(pool);
    let entries = CartEntryRepository::new(pool);

    let existing: BTreeMap<(ProductId, String), u32> = entries
        .list(user_id)
        .await?
        .into_iter()
        .map(|entry| {
            (
                (entry.product_id, entry.size),
                u32::try_from(entry.quantity).unwrap_or(0),
            )
        })
        .collect();

    for (product, size, quantity) in session_cart.lines() {
        let Some(variant) = catalog.variant(product, size).await? else {
            continue;
        };
        let stock = variant.stock();
        let current = existing
            .get(&(product, size.to_owned()))
            .copied()
            .unwrap_or(0);
        let combined = (current + quantity).min(stock);

        if current == 0 {
            if combined > 0 {
                entries.add(user_id, product, size, combined).await?;
            }
        } else if combined != current {
            entries.set_quantity(user_id, product, size, combined).await?;
        }
    }
    Ok(())
}
