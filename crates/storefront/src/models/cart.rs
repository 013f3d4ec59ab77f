//! Cart models: the anonymous session cart, the normalized cart view, and
//! the snapshot format attached to payment intents.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coffee_hub_core::ProductId;

/// The anonymous, session-scoped cart.
///
/// Shape matches what is persisted in the session store: a nested mapping of
/// `product_id -> size -> quantity`. Product IDs are kept as strings because
/// the session payload is JSON and JSON object keys are strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCart(BTreeMap<String, BTreeMap<String, u32>>);

impl SessionCart {
    /// True when no line has a positive quantity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Add `quantity` to the line for `(product, size)`, creating nested
    /// entries as needed.
    pub fn add(&mut self, product: ProductId, size: &str, quantity: u32) {
        let sizes = self.0.entry(product.to_string()).or_default();
        *sizes.entry(size.to_owned()).or_insert(0) += quantity;
    }

    /// Set the absolute quantity for `(product, size)`.
    ///
    /// A quantity of zero removes the line. Returns `false` if the line was
    /// absent.
    pub fn set(&mut self, product: ProductId, size: &str, quantity: u32) -> bool {
        let key = product.to_string();
        let Some(sizes) = self.0.get_mut(&key) else {
            return false;
        };
        if !sizes.contains_key(size) {
            return false;
        }
        if quantity == 0 {
            sizes.remove(size);
            if sizes.is_empty() {
                self.0.remove(&key);
            }
        } else if let Some(q) = sizes.get_mut(size) {
            *q = quantity;
        }
        true
    }

    /// Remove the line for `(product, size)`. Returns `false` if absent.
    pub fn remove(&mut self, product: ProductId, size: &str) -> bool {
        let key = product.to_string();
        let Some(sizes) = self.0.get_mut(&key) else {
            return false;
        };
        let removed = sizes.remove(size).is_some();
        if sizes.is_empty() {
            self.0.remove(&key);
        }
        removed
    }

    /// Iterate over `(product, size, quantity)` lines.
    ///
    /// Lines whose product key does not parse as an integer ID are skipped;
    /// they can only come from a corrupted session payload.
    pub fn lines(&self) -> impl Iterator<Item = (ProductId, &str, u32)> {
        self.0.iter().flat_map(|(product, sizes)| {
            let product = product.parse::<i32>().ok().map(ProductId::new);
            sizes.iter().filter_map(move |(size, quantity)| {
                product.map(|p| (p, size.as_str(), *quantity))
            })
        })
    }
}

/// One line of a normalized cart view.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub product_name: String,
    pub slug: String,
    pub size: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub stock: u32,
    pub line_total: Decimal,
}

/// A quantity clamp applied while reading the cart, surfaced to the caller
/// as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub product_name: String,
    pub size: String,
    pub old_quantity: u32,
    pub new_quantity: u32,
}

/// The normalized, stock-validated read of a cart plus its grand total.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: Decimal,
    pub adjustments: Vec<Adjustment>,
}

impl CartView {
    /// True when the view holds no purchasable lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The cart contents in the snapshot format attached to payment intents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CartSnapshotLine> {
        self.lines
            .iter()
            .map(|line| CartSnapshotLine {
                id: line.product_id,
                size: line.size.clone(),
                quantity: line.quantity,
                price: line.unit_price,
                subtotal: line.line_total,
            })
            .collect()
    }
}

/// One line of the cart snapshot serialized into payment-intent metadata.
///
/// A webhook arriving later has no session access; this snapshot is all the
/// commit pipeline gets to rebuild the order from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshotLine {
    pub id: ProductId,
    pub size: String,
    pub quantity: u32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(id: i32) -> ProductId {
        ProductId::new(id)
    }

    #[test]
    fn add_creates_nested_entries_and_accumulates() {
        let mut cart = SessionCart::default();
        assert!(cart.is_empty());

        cart.add(p(1), "M", 2);
        cart.add(p(1), "M", 3);
        cart.add(p(1), "L", 1);

        let lines: Vec<_> = cart.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&(p(1), "L", 1)));
        assert!(lines.contains(&(p(1), "M", 5)));
    }

    #[test]
    fn set_zero_removes_line_and_is_idempotent() {
        let mut cart = SessionCart::default();
        cart.add(p(1), "M", 2);

        assert!(cart.set(p(1), "M", 0));
        assert!(cart.is_empty());

        // Second update of an absent line reports not-found, same end state.
        assert!(!cart.set(p(1), "M", 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn set_overwrites_rather_than_adds() {
        let mut cart = SessionCart::default();
        cart.add(p(2), "S", 4);
        assert!(cart.set(p(2), "S", 1));
        assert_eq!(cart.lines().next(), Some((p(2), "S", 1)));
    }

    #[test]
    fn remove_reports_absent_lines() {
        let mut cart = SessionCart::default();
        cart.add(p(1), "M", 2);

        assert!(cart.remove(p(1), "M"));
        assert!(!cart.remove(p(1), "M"));
        assert!(!cart.remove(p(9), "XL"));
    }

    #[test]
    fn serializes_to_the_session_json_shape() {
        let mut cart = SessionCart::default();
        cart.add(p(3), "250g", 2);

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json, serde_json::json!({"3": {"250g": 2}}));
    }

    #[test]
    fn corrupted_product_keys_are_skipped() {
        let cart: SessionCart =
            serde_json::from_value(serde_json::json!({"not-a-number": {"M": 1}, "4": {"S": 2}}))
                .unwrap();
        let lines: Vec<_> = cart.lines().collect();
        assert_eq!(lines, vec![(p(4), "S", 2)]);
    }
}
