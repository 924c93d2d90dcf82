//! Core types for Seedling.
//!
//! This module provides type-safe wrappers for Chec domain concepts.

pub mod id;
pub mod price;

pub use id::{CartId, IdError, LineItemId, ProductId};
pub use price::{Currency, Price};
