//! Chec (Commerce.js) API client.
//!
//! # Architecture
//!
//! - Plain REST over `reqwest`, JSON decoded with `serde`
//! - Chec is the source of truth - NO local sync, direct API calls
//! - In-memory caching via `moka` for merchant and product responses
//! - Carts are never cached (mutable state)
//!
//! # Call Surface
//!
//! ```text
//! merchants.about()  GET    /merchants
//! products.list()    GET    /products?limit=&page=
//! cart.retrieve()    GET    /carts/{cart_id}   (GET /carts creates one)
//! cart.add()         POST   /carts/{cart_id}
//! cart.update()      PUT    /carts/{cart_id}/items/{line_item_id}
//! cart.remove()      DELETE /carts/{cart_id}/items/{line_item_id}
//! cart.empty()       DELETE /carts/{cart_id}/items
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use seedling_storefront::commerce::CommerceClient;
//!
//! let client = CommerceClient::new(&config.chec);
//!
//! let merchant = client.about_merchant().await?;
//! let cart = client.create_cart().await?;
//! let cart = client.add_to_cart(&cart.id, &product_id, 1).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::CommerceClient;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when interacting with the Chec API.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found (unknown or expired cart, deleted line item).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Chec.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Chec returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },
}

impl CommerceError {
    /// Whether the error means the referenced resource no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Error body returned by Chec on failure.
///
/// ```json
/// {"status_code": 422, "error": {"type": "validation", "message": "...", "errors": {"quantity": ["..."]}}}
/// ```
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiErrorBody {
    /// HTTP status code echoed in the body.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Error details.
    pub error: ApiErrorDetail,
}

/// Details inside an [`ApiErrorBody`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiErrorDetail {
    /// Error category (e.g., "`not_found`", "validation").
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Per-field validation messages.
    #[serde(default)]
    pub errors: std::collections::BTreeMap<String, Vec<String>>,
}

/// Format a Chec error body into a single line.
fn format_api_error(body: &ApiErrorBody) -> String {
    let mut parts = Vec::new();

    if !body.error.message.is_empty() {
        parts.push(body.error.message.clone());
    }

    let fields = body
        .error
        .errors
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
        .collect::<Vec<_>>();
    if !fields.is_empty() {
        parts.push(format!("[{}]", fields.join("; ")));
    }

    if parts.is_empty() {
        if body.error.kind.is_empty() {
            return "(no error details provided)".to_string();
        }
        return body.error.kind.clone();
    }

    parts.join(" ")
}
