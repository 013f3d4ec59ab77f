//! Order models: the immutable order record and its line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coffee_hub_core::{OrderId, OrderLineId, OrderStatus, ProductId, UserId};

/// A committed order.
///
/// Contact and shipping fields are snapshots captured at commit time; later
/// profile edits never alter past orders. `payment_reference` is the
/// processor's transaction id and doubles as the idempotency key.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub order_number: String,
    pub status: OrderStatus,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    pub postcode: Option<String>,
    pub town_or_city: String,
    pub street_address1: String,
    pub street_address2: Option<String>,
    pub county: Option<String>,
    pub total: Decimal,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
}

/// A single line of an order.
///
/// Product name and unit price are snapshots; later catalog edits never
/// alter historical orders. `line_total = unit_price * quantity`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub size: String,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Contact and shipping details captured at commit time.
///
/// This is both the checkout form payload and the webhook's shipping/billing
/// extraction, so it lives with the order rather than with either caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub country: String,
    pub postcode: Option<String>,
    pub town_or_city: String,
    pub street_address1: String,
    pub street_address2: Option<String>,
    pub county: Option<String>,
}

impl ContactDetails {
    /// Normalize empty optional fields to `None`.
    ///
    /// Payment processors echo back empty strings for address fields the
    /// customer left blank.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.postcode,
            &mut self.street_address2,
            &mut self.county,
        ] {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_blanks_become_none() {
        let details = ContactDetails {
            full_name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            phone_number: "555-0100".into(),
            country: "GB".into(),
            postcode: Some(String::new()),
            town_or_city: "London".into(),
            street_address1: "1 Analytical Way".into(),
            street_address2: Some("  ".into()),
            county: Some("Greater London".into()),
        }
        .normalized();

        assert_eq!(details.postcode, None);
        assert_eq!(details.street_address2, None);
        assert_eq!(details.county.as_deref(), Some("Greater London"));
    }
}
