//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Storefront page (merchant, products, cart)
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (Chec reachable)
//!
//! # Cart
//! GET  /cart                   - Cart page
//! GET  /cart/count             - Cart count badge (fragment)
//! POST /cart/toggle            - Open or close the cart panel
//! POST /cart/add               - Add to cart
//! POST /cart/update            - Update quantity
//! POST /cart/remove            - Remove item
//! POST /cart/empty             - Remove all items
//!
//! # Checkout
//! GET  /checkout               - Redirect to Chec hosted checkout
//! ```
//!
//! Cart POSTs answer with a 303 redirect back to the form's `return_to`.

pub mod cart;
pub mod home;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::cart_rate_limiter;
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let actions = Router::new()
        .route("/toggle", post(cart::toggle))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/empty", post(cart::empty))
        .layer(cart_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(actions)
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/cart", cart_routes())
        .route("/checkout", get(cart::checkout))
}
