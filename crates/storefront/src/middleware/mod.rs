//! Request middleware: sessions, authentication extractors, and the
//! post-login cart-choice redirect.

pub mod auth;
pub mod cart_choice;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use cart_choice::cart_choice_redirect;
pub use session::create_session_layer;
