//! Domain models for storefront.
//!
//! The storefront owns no commerce data; the only local model is the
//! per-visitor state kept in the session.

pub mod session;

pub use session::keys as session_keys;
