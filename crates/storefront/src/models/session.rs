//! Session-related types.
//!
//! Types stored in the session for the visitor's cart.

/// Session keys.
pub mod keys {
    /// Key for the visitor's [`CartState`](crate::services::cart::CartState).
    pub const CART_STATE: &str = "cart_state";
}
