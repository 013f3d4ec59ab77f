//! The order commit pipeline.
//!
//! The single authoritative place where a cart snapshot becomes a durable
//! order. Safe to invoke twice for the same logical purchase: the
//! synchronous form submit and the asynchronous webhook can race, and the
//! unique constraint on `payment_reference` guarantees at most one order
//! survives.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;

use coffee_hub_core::{ProductId, UserId};

use crate::db::orders::{NewOrder, NewOrderLine};
use crate::db::{CartEntryRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::models::{CartSnapshotLine, ContactDetails, Order};
use crate::services::Mailer;

/// Errors from the commit pipeline.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The snapshot holds no lines; there is nothing to commit.
    #[error("cannot commit an empty cart")]
    EmptyCart,

    /// A snapshot line references a product that no longer exists. The
    /// transaction was rolled back; no partial order survives and the
    /// source cart is left untouched for retry.
    #[error("product {product} ({size}) could not be resolved")]
    ProductMissing { product: ProductId, size: String },

    /// Database failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One commit invocation's input: everything needed to materialize the
/// order without any session access.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// The payment processor's transaction id; the idempotency key.
    pub payment_reference: String,
    pub contact: ContactDetails,
    pub user_id: Option<UserId>,
    pub lines: Vec<CartSnapshotLine>,
    pub save_info: bool,
}

/// What a commit invocation did.
#[derive(Debug)]
pub enum CommitOutcome {
    /// This invocation created the order and performed the side effects.
    Created(Order),
    /// An order for this payment reference already existed; no duplicate
    /// was created, stock was not decremented again, and the confirmation
    /// was not re-sent.
    AlreadyCommitted(Order),
}

impl CommitOutcome {
    /// The committed order, however we got it.
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Created(order) | Self::AlreadyCommitted(order) => order,
        }
    }
}

/// Build order line inputs from a cart snapshot and resolved product names.
///
/// Explicit result branching: a missing product is a normal branch, not an
/// exception, so the caller's rollback path is ordinary control flow.
///
/// # Errors
///
/// Returns `CommitError::ProductMissing` for the first unresolvable line.
pub fn build_lines(
    snapshot: &[CartSnapshotLine],
    product_names: &HashMap<ProductId, String>,
) -> Result<Vec<NewOrderLine>, CommitError> {
    snapshot
        .iter()
        .map(|line| {
            let name = product_names
                .get(&line.id)
                .ok_or_else(|| CommitError::ProductMissing {
                    product: line.id,
                    size: line.size.clone(),
                })?;
            Ok(NewOrderLine {
                product_id: line.id,
                product_name: name.clone(),
                unit_price: line.price,
                size: line.size.clone(),
                quantity: line.quantity,
            })
        })
        .collect()
}

/// The order commit pipeline.
pub struct CommitPipeline<'a> {
    pool: &'a PgPool,
    mailer: Option<&'a Mailer>,
}

impl<'a> CommitPipeline<'a> {
    /// Create a pipeline over the database and the (optional) mailer.
    #[must_use]
    pub const fn new(pool: &'a PgPool, mailer: Option<&'a Mailer>) -> Self {
        Self { pool, mailer }
    }

    /// Commit a cart snapshot into an order, idempotently per payment
    /// reference.
    ///
    /// Side effects performed exactly once, on the creating invocation
    /// only: stock decrement (floored at zero), persistent-cart clear,
    /// profile snapshot when `save_info`, and one confirmation email.
    /// Clearing the anonymous session cart is the caller's duty; this
    /// pipeline has no session access.
    ///
    /// # Errors
    ///
    /// Returns `CommitError::EmptyCart` for an empty snapshot and
    /// `CommitError::ProductMissing` when a line cannot be resolved; the
    /// cart is left untouched in both cases so the user can retry.
    pub async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, CommitError> {
        if request.lines.is_empty() {
            return Err(CommitError::EmptyCart);
        }

        let orders = OrderRepository::new(self.pool);

        if let Some(existing) = orders
            .find_by_payment_reference(&request.payment_reference)
            .await?
        {
            tracing::info!(
                order = %existing.order_number,
                reference = %request.payment_reference,
                "order already committed for payment reference"
            );
            self.clear_persistent_cart(request.user_id).await;
            return Ok(CommitOutcome::AlreadyCommitted(existing));
        }

        let catalog = ProductRepository::new(self.pool);
        let mut product_names = HashMap::new();
        for line in &request.lines {
            if product_names.contains_key(&line.id) {
                continue;
            }
            if let Some(product) = catalog.product(line.id).await? {
                product_names.insert(line.id, product.name);
            }
        }
        let lines = build_lines(&request.lines, &product_names)?;

        let contact = request.contact.clone().normalized();
        let created = orders
            .create(
                NewOrder {
                    user_id: request.user_id,
                    contact: &contact,
                    payment_reference: &request.payment_reference,
                },
                &lines,
            )
            .await;

        let order = match created {
            Ok(order) => order,
            // Lost the race against a concurrent commit for the same
            // reference: fold into the idempotent already-committed case.
            Err(RepositoryError::Conflict(_)) => {
                let existing = orders
                    .find_by_payment_reference(&request.payment_reference)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                tracing::info!(
                    order = %existing.order_number,
                    "concurrent commit won the payment reference"
                );
                self.clear_persistent_cart(request.user_id).await;
                return Ok(CommitOutcome::AlreadyCommitted(existing));
            }
            // A product vanished between resolution and insert.
            Err(RepositoryError::NotFound) => {
                let first = &request.lines[0];
                return Err(CommitError::ProductMissing {
                    product: first.id,
                    size: first.size.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            order = %order.order_number,
            total = %order.total,
            "order committed"
        );

        // Exactly-once side effects for the creating invocation.
        for line in &lines {
            catalog
                .decrement_stock(line.product_id, &line.size, line.quantity)
                .await?;
        }

        self.clear_persistent_cart(request.user_id).await;

        if request.save_info
            && let Some(user_id) = request.user_id
            && let Err(e) = UserRepository::new(self.pool)
                .save_profile_from_contact(user_id, &contact)
                .await
        {
            tracing::warn!("failed to save profile defaults: {e}");
        }

        self.send_confirmation(&order).await;

        Ok(CommitOutcome::Created(order))
    }

    /// Clear the purchaser's persistent cart. Clearing an already-empty
    /// cart is a no-op, so this may run on every commit invocation.
    async fn clear_persistent_cart(&self, user_id: Option<UserId>) {
        if let Some(user_id) = user_id
            && let Err(e) = CartEntryRepository::new(self.pool).clear(user_id).await
        {
            tracing::warn!(user = %user_id, "failed to clear persistent cart: {e}");
        }
    }

    /// Send the confirmation email, best effort. A delivery failure must
    /// not fail the commit: the order exists and a retried webhook would be
    /// answered with `AlreadyCommitted` anyway.
    async fn send_confirmation(&self, order: &Order) {
        let Some(mailer) = self.mailer else {
            tracing::info!(order = %order.order_number, "mailer disabled, skipping confirmation");
            return;
        };

        let lines = match OrderRepository::new(self.pool).lines(order.id).await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("failed to load order lines for confirmation: {e}");
                return;
            }
        };

        if let Err(e) = mailer.send_order_confirmation(order, &lines).await {
            tracing::warn!(order = %order.order_number, "confirmation email failed: {e}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot_line(id: i32, size: &str, quantity: u32, price: &str) -> CartSnapshotLine {
        let price: rust_decimal::Decimal = price.parse().unwrap();
        CartSnapshotLine {
            id: ProductId::new(id),
            size: size.to_owned(),
            quantity,
            price,
            subtotal: price * rust_decimal::Decimal::from(quantity),
        }
    }

    #[test]
    fn lines_snapshot_name_and_price() {
        let names = HashMap::from([(ProductId::new(1), "House Blend".to_owned())]);
        let lines = build_lines(&[snapshot_line(1, "250g", 3, "5.00")], &names).unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_name, "House Blend");
        assert_eq!(lines[0].unit_price, "5.00".parse().unwrap());
        assert_eq!(lines[0].quantity, 3);
    }

    #[test]
    fn missing_product_is_a_normal_error_branch() {
        let names = HashMap::new();
        let err = build_lines(&[snapshot_line(9, "L", 1, "4.00")], &names).unwrap_err();

        match err {
            CommitError::ProductMissing { product, size } => {
                assert_eq!(product, ProductId::new(9));
                assert_eq!(size, "L");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
