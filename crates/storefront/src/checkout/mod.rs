//! Checkout: bridging a validated cart view to the payment processor, and
//! committing paid carts into durable orders.

pub mod commit;
pub mod orchestrator;

pub use commit::{CommitError, CommitOutcome, CommitPipeline, CommitRequest};
pub use orchestrator::{CheckoutError, CheckoutOrchestrator};
