//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Per-visitor cart state and the cart actions forwarded to Chec
//! - `catalog` - Concurrent page data loading (merchant, products, cart)

pub mod cart;
pub mod catalog;
