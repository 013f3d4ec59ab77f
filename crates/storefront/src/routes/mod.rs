//! HTTP route handlers for the storefront.
//!
//! Handlers expose plain JSON data for the rendering layer; they never
//! format HTML.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (database)
//!
//! # Catalog
//! GET  /products                - Active product listing
//! GET  /products/{slug}         - Product detail with variants
//!
//! # Cart
//! GET  /cart                    - Normalized cart view
//! POST /cart/add                - Add a quantity of (product, size)
//! POST /cart/update             - Set an absolute quantity (0 deletes)
//! POST /cart/remove             - Remove a line
//! GET  /cart/choice             - Both carts, for the post-login choice
//! POST /cart/choice             - Resolve the pending cart choice
//!
//! # Checkout
//! GET  /checkout                - Prepare payment intent + checkout data
//! POST /checkout/cache          - Re-attach intent metadata pre-confirm
//! POST /checkout                - Commit the cart into an order
//! POST /checkout/wh             - Payment processor webhook
//!
//! # Auth
//! POST /auth/register           - Create an account
//! POST /auth/login              - Login (runs cart reconciliation)
//! POST /auth/logout             - Logout and flush the session
//!
//! # Account (requires auth)
//! GET  /account/profile         - Stored checkout defaults
//! PUT  /account/profile         - Update stored defaults
//! GET  /account/orders          - Order history
//!
//! # Admin (requires role per the policy table)
//! GET  /admin/products          - Listing including inactive inventory
//! PUT  /admin/variants/{id}     - Edit variant price/stock/active
//! PUT  /admin/orders/{id}/status - Change order status
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/choice", get(cart::choice).post(cart::resolve_choice))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::entry).post(checkout::submit))
        .route("/cache", post(checkout::cache))
        .route("/wh", post(webhook::receive))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).put(account::update_profile),
        )
        .route("/orders", get(account::orders))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(admin::products))
        .route("/variants/{id}", put(admin::update_variant))
        .route("/orders/{id}/status", put(admin::update_order_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::index))
        .route("/products/{slug}", get(catalog::show))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .nest("/admin", admin_routes())
}
