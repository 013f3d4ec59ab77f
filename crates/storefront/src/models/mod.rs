//! Domain models for the storefront.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod session;
pub mod user;

pub use cart::{Adjustment, CartLineView, CartSnapshotLine, CartView, SessionCart};
pub use catalog::{Product, Variant};
pub use order::{ContactDetails, Order, OrderLine};
pub use session::{CheckoutSession, CurrentUser, session_keys};
pub use user::{Role, User, UserProfile};
