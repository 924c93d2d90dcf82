//! Cache types for Chec API responses.

use crate::commerce::types::{Merchant, ProductCollection};

/// Cache key for catalog responses.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Merchant,
    Products { limit: u32, page: u32 },
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Merchant(Box<Merchant>),
    Products(ProductCollection),
}
