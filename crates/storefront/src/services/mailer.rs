//! Order confirmation email via SMTP.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use std::fmt::Write as _;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{Order, OrderLine};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

/// Mailer for transactional storefront email.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_owned(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    /// Send the order confirmation for a freshly committed order.
    ///
    /// Plain text; the commit pipeline calls this exactly once per created
    /// order.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        lines: &[OrderLine],
    ) -> Result<(), EmailError> {
        let subject = format!("Coffee Hub order confirmation {}", order.order_number);
        let body = confirmation_body(order, lines);

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(order
                .email
                .parse()
                .map_err(|_| EmailError::InvalidAddress(order.email.clone()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Render the plain-text confirmation body.
fn confirmation_body(order: &Order, lines: &[OrderLine]) -> String {
    let mut body = format!(
        "Hello {},\n\nThank you for your order!\n\nOrder number: {}\n\n",
        order.full_name, order.order_number
    );
    for line in lines {
        let _ = writeln!(
            body,
            "  {} ({}) x {} - {}",
            line.product_name, line.size, line.quantity, line.line_total
        );
    }
    let _ = write!(
        body,
        "\nOrder total: {}\n\nShipping to:\n  {}\n  {}\n",
        order.total, order.street_address1, order.town_or_city
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coffee_hub_core::{OrderId, OrderLineId, OrderStatus, ProductId};

    #[test]
    #[allow(clippy::unwrap_used)]
    fn confirmation_body_lists_lines_and_total() {
        let order = Order {
            id: OrderId::new(1),
            user_id: None,
            order_number: "ABC123".into(),
            status: OrderStatus::Processing,
            full_name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            phone_number: "555-0101".into(),
            country: "US".into(),
            postcode: None,
            town_or_city: "Arlington".into(),
            street_address1: "1 Navy Way".into(),
            street_address2: None,
            county: None,
            total: "15.00".parse().unwrap(),
            payment_reference: "pi_test".into(),
            created_at: Utc::now(),
        };
        let lines = vec![OrderLine {
            id: OrderLineId::new(1),
            order_id: order.id,
            product_id: ProductId::new(2),
            product_name: "House Blend".into(),
            unit_price: "5.00".parse().unwrap(),
            size: "250g".into(),
            quantity: 3,
            line_total: "15.00".parse().unwrap(),
        }];

        let body = confirmation_body(&order, &lines);
        assert!(body.contains("ABC123"));
        assert!(body.contains("House Blend (250g) x 3"));
        assert!(body.contains("Order total: 15.00"));
    }
}
