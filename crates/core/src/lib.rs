//! Seedling Core - Shared types library.
//!
//! This crate provides common types used across the Seedling components:
//! - `storefront` - Public-facing storefront backed by the Chec API
//! - `integration-tests` - End-to-end tests against a fake Chec API
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Validated Chec entity IDs and the Chec price representation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
