//! The cart store: normalized, stock-validated reads and validated writes
//! over whichever [`CartRepository`] backs the current identity.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;

use coffee_hub_core::ProductId;

use super::repository::{CartKind, CartRepository, RawCartLine};
use super::CartError;
use crate::db::ProductRepository;
use crate::models::{Adjustment, CartLineView, CartView};

/// A variant resolved for view building, with its product's display fields.
#[derive(Debug, Clone)]
pub struct ResolvedVariant {
    pub product_name: String,
    pub slug: String,
    pub unit_price: Decimal,
    pub stock: u32,
}

/// The outcome of planning a view: what to show, plus the write-backs that
/// make storage consistent with it.
#[derive(Debug)]
pub struct ViewPlan {
    pub view: CartView,
    /// Lines whose stored quantity must be clamped down to stock.
    pub clamps: Vec<(ProductId, String, u32)>,
    /// Lines to delete: clamped to zero, or referencing a vanished product.
    pub drops: Vec<(ProductId, String)>,
}

/// Build the normalized view of `lines` against the resolved variants.
///
/// Pure function so the clamping rules are testable without storage:
/// - quantity above stock is clamped down and reported as an [`Adjustment`];
/// - a clamp to zero drops the line (still reported);
/// - lines referencing a missing or inactive variant are dropped silently.
#[must_use]
pub fn plan_view(
    lines: &[RawCartLine],
    resolved: &HashMap<(ProductId, String), ResolvedVariant>,
) -> ViewPlan {
    let mut view_lines = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;
    let mut adjustments = Vec::new();
    let mut clamps = Vec::new();
    let mut drops = Vec::new();

    for line in lines {
        let key = (line.product_id, line.size.clone());
        let Some(variant) = resolved.get(&key) else {
            drops.push(key);
            continue;
        };

        let mut quantity = line.quantity;
        if quantity > variant.stock {
            adjustments.push(Adjustment {
                product_name: variant.product_name.clone(),
                size: line.size.clone(),
                old_quantity: quantity,
                new_quantity: variant.stock,
            });
            quantity = variant.stock;
            if quantity == 0 {
                drops.push(key);
                continue;
            }
            clamps.push((line.product_id, line.size.clone(), quantity));
        }

        if quantity == 0 {
            drops.push(key);
            continue;
        }

        let line_total = variant.unit_price * Decimal::from(quantity);
        total += line_total;
        view_lines.push(CartLineView {
            product_id: line.product_id,
            product_name: variant.product_name.clone(),
            slug: variant.slug.clone(),
            size: line.size.clone(),
            unit_price: variant.unit_price,
            quantity,
            stock: variant.stock,
            line_total,
        });
    }

    ViewPlan {
        view: CartView {
            lines: view_lines,
            total,
            adjustments,
        },
        clamps,
        drops,
    }
}

/// Cart operations for one identity, written once against the repository
/// interface.
pub struct CartStore<'a, R> {
    repo: R,
    catalog: ProductRepository<'a>,
}

impl<'a, R: CartRepository> CartStore<'a, R> {
    /// Create a cart store over a backend and the inventory ledger.
    #[must_use]
    pub const fn new(repo: R, pool: &'a PgPool) -> Self {
        Self {
            repo,
            catalog: ProductRepository::new(pool),
        }
    }

    /// The underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repo
    }

    /// Produce the normalized cart view, self-healing stored state.
    ///
    /// Clamps are written back immediately so a subsequent read is already
    /// consistent; dropped lines are deleted from storage.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository`/`CartError::Session` on storage
    /// failures.
    pub async fn view(&self) -> Result<CartView, CartError> {
        let raw = self.repo.lines().await?;
        let keys: Vec<_> = raw
            .iter()
            .map(|line| (line.product_id, line.size.clone()))
            .collect();
        let resolved = self.catalog.resolve_cart_keys(&keys).await?;
        let resolved: HashMap<_, _> = resolved
            .into_iter()
            .map(|(key, (variant, product_name, slug))| {
                (
                    key,
                    ResolvedVariant {
                        product_name,
                        slug,
                        unit_price: variant.unit_price,
                        stock: variant.stock(),
                    },
                )
            })
            .collect();

        let plan = plan_view(&raw, &resolved);

        for (product, size, quantity) in &plan.clamps {
            self.repo.set_quantity(*product, size, *quantity).await?;
        }
        for (product, size) in &plan.drops {
            self.repo.remove(*product, size).await?;
        }

        if !plan.view.adjustments.is_empty() {
            tracing::info!(
                adjustments = plan.view.adjustments.len(),
                "clamped cart quantities to stock"
            );
        }

        Ok(plan.view)
    }

    /// Add `quantity` of `(product, size)` to the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a zero quantity or one exceeding
    /// stock, and `CartError::NotFound` for an unknown variant. For the
    /// persistent backend the combined quantity is re-validated against
    /// stock; on rejection the pre-existing row is left untouched.
    pub async fn add(
        &self,
        product: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::Validation(
                "Quantity must be at least 1.".to_owned(),
            ));
        }

        let variant = self
            .catalog
            .variant(product, size)
            .await?
            .ok_or(CartError::NotFound("product variant"))?;
        let stock = variant.stock();

        if quantity > stock {
            return Err(CartError::Validation(format!(
                "Invalid quantity. Only {stock} items are available."
            )));
        }

        if self.repo.kind() == CartKind::Persistent {
            let existing = self
                .repo
                .lines()
                .await?
                .into_iter()
                .find(|line| line.product_id == product && line.size == size)
                .map_or(0, |line| line.quantity);
            if existing + quantity > stock {
                return Err(CartError::Validation(format!(
                    "Adding {quantity} exceeds available stock of {stock}."
                )));
            }
        }

        self.repo.add(product, size, quantity).await
    }

    /// Set an absolute quantity for `(product, size)`; zero deletes the
    /// line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if the quantity exceeds stock and
    /// `CartError::NotFound` for an unknown variant or a line not in the
    /// cart.
    pub async fn update(
        &self,
        product: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<(), CartError> {
        let variant = self
            .catalog
            .variant(product, size)
            .await?
            .ok_or(CartError::NotFound("product variant"))?;
        let stock = variant.stock();

        if quantity > stock {
            return Err(CartError::Validation(format!(
                "Invalid quantity. Only {stock} items are available."
            )));
        }

        let found = self.repo.set_quantity(product, size, quantity).await?;
        if !found {
            return Err(CartError::NotFound("cart item"));
        }
        Ok(())
    }

    /// Remove the line for `(product, size)`.
    ///
    /// Removing an absent line reports `Ok(false)` rather than erroring.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository`/`CartError::Session` on storage
    /// failures.
    pub async fn remove(&self, product: ProductId, size: &str) -> Result<bool, CartError> {
        self.repo.remove(product, size).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository`/`CartError::Session` on storage
    /// failures.
    pub async fn clear(&self) -> Result<(), CartError> {
        self.repo.clear().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(id: i32) -> ProductId {
        ProductId::new(id)
    }

    fn line(id: i32, size: &str, quantity: u32) -> RawCartLine {
        RawCartLine {
            product_id: p(id),
            size: size.to_owned(),
            quantity,
        }
    }

    fn variant(name: &str, price: &str, stock: u32) -> ResolvedVariant {
        ResolvedVariant {
            product_name: name.to_owned(),
            slug: name.to_lowercase().replace(' ', "-"),
            unit_price: price.parse().unwrap(),
            stock,
        }
    }

    fn resolved(
        entries: Vec<(i32, &str, ResolvedVariant)>,
    ) -> HashMap<(ProductId, String), ResolvedVariant> {
        entries
            .into_iter()
            .map(|(id, size, v)| ((p(id), size.to_owned()), v))
            .collect()
    }

    #[test]
    fn in_stock_lines_pass_through_with_line_totals() {
        let plan = plan_view(
            &[line(1, "250g", 3)],
            &resolved(vec![(1, "250g", variant("House Blend", "5.00", 10))]),
        );

        assert_eq!(plan.view.lines.len(), 1);
        let first = &plan.view.lines[0];
        assert_eq!(first.quantity, 3);
        assert_eq!(first.line_total, "15.00".parse().unwrap());
        assert_eq!(plan.view.total, "15.00".parse().unwrap());
        assert!(plan.view.adjustments.is_empty());
        assert!(plan.clamps.is_empty());
        assert!(plan.drops.is_empty());
    }

    #[test]
    fn over_stock_quantity_is_clamped_and_written_back() {
        let plan = plan_view(
            &[line(1, "1kg", 8)],
            &resolved(vec![(1, "1kg", variant("Dark Roast", "18.50", 5))]),
        );

        assert_eq!(plan.view.lines[0].quantity, 5);
        assert_eq!(
            plan.view.adjustments,
            vec![Adjustment {
                product_name: "Dark Roast".to_owned(),
                size: "1kg".to_owned(),
                old_quantity: 8,
                new_quantity: 5,
            }]
        );
        assert_eq!(plan.clamps, vec![(p(1), "1kg".to_owned(), 5)]);
        assert_eq!(plan.view.total, "92.50".parse().unwrap());
    }

    #[test]
    fn clamp_to_zero_drops_the_line_but_reports_it() {
        let plan = plan_view(
            &[line(2, "M", 4)],
            &resolved(vec![(2, "M", variant("Mug", "9.00", 0))]),
        );

        assert!(plan.view.lines.is_empty());
        assert_eq!(plan.view.total, Decimal::ZERO);
        assert_eq!(plan.view.adjustments[0].new_quantity, 0);
        assert_eq!(plan.drops, vec![(p(2), "M".to_owned())]);
        assert!(plan.clamps.is_empty());
    }

    #[test]
    fn missing_variants_are_dropped_silently() {
        let plan = plan_view(
            &[line(1, "250g", 2), line(9, "L", 1)],
            &resolved(vec![(1, "250g", variant("House Blend", "5.00", 10))]),
        );

        assert_eq!(plan.view.lines.len(), 1);
        // Not an adjustment: the caller decides whether to surface this.
        assert!(plan.view.adjustments.is_empty());
        assert_eq!(plan.drops, vec![(p(9), "L".to_owned())]);
    }

    #[test]
    fn total_sums_across_lines() {
        let plan = plan_view(
            &[line(1, "250g", 2), line(1, "1kg", 1)],
            &resolved(vec![
                (1, "250g", variant("House Blend", "5.00", 10)),
                (1, "1kg", variant("House Blend", "18.50", 3)),
            ]),
        );

        assert_eq!(plan.view.total, "28.50".parse().unwrap());
    }
}
