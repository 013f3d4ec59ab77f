//! External-facing services: the payment processor client, the SMTP
//! mailer, and password authentication.

pub mod auth;
pub mod mailer;
pub mod payments;

pub use mailer::{EmailError, Mailer};
pub use payments::{IntentMetadata, IntentSummary, PaymentClient, PaymentError, PaymentIntent};
