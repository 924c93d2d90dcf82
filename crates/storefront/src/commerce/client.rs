//! Chec REST API client implementation.
//!
//! Caches the merchant and product pages using `moka`; carts always go to
//! the API.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use seedling_core::{CartId, LineItemId, ProductId};

use crate::commerce::CommerceError;
use crate::commerce::cache::{CacheKey, CacheValue};
use crate::commerce::types::{
    AddToCartBody, Cart, CartMutation, Merchant, ProductCollection, UpdateLineItemBody,
};
use crate::commerce::{ApiErrorBody, format_api_error};
use crate::config::ChecConfig;

/// Header Chec reads the public key from.
const AUTH_HEADER: &str = "X-Authorization";

/// Identifies this client to Chec.
const AGENT_HEADER: &str = "X-Chec-Agent";

const MAX_CACHE_ENTRIES: u64 = 100;

/// Characters of a raw error body kept for logs and messages.
const BODY_PREVIEW_CHARS: usize = 200;

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the Chec (Commerce.js) REST API.
///
/// Cheaply cloneable; all clones share the HTTP connection pool and cache.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    api_url: String,
    public_key: String,
    products_per_page: u32,
    cache: Cache<CacheKey, CacheValue>,
}

impl CommerceClient {
    /// Create a new Chec API client.
    #[must_use]
    pub fn new(config: &ChecConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(config.cache_ttl)
            .build();

        Self {
            inner: Arc::new(CommerceClientInner {
                client: reqwest::Client::new(),
                api_url: config.api_url.trim_end_matches('/').to_string(),
                public_key: config.public_key.expose_secret().to_string(),
                products_per_page: config.products_per_page,
                cache,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.api_url)
    }

    /// Send a request and decode the JSON response.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CommerceError> {
        let response = request
            .header(AUTH_HEADER, &self.inner.public_key)
            .header(
                AGENT_HEADER,
                concat!("seedling-storefront/", env!("CARGO_PKG_VERSION")),
            )
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CommerceError::RateLimited(retry_after));
        }

        // Read as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            let err = error_from_response(status, &response_text);
            if !err.is_not_found() {
                tracing::error!(
                    status = %status,
                    body = %preview(&response_text),
                    "Chec API returned non-success status"
                );
            }
            return Err(err);
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %preview(&response_text),
                "Failed to parse Chec API response"
            );
            CommerceError::Parse(e)
        })
    }

    // =========================================================================
    // Merchant
    // =========================================================================

    /// Get the merchant's public details.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn about_merchant(&self) -> Result<Merchant, CommerceError> {
        if let Some(CacheValue::Merchant(merchant)) =
            self.inner.cache.get(&CacheKey::Merchant).await
        {
            debug!("Cache hit for merchant");
            return Ok(*merchant);
        }

        let merchant: Merchant = self
            .send(self.inner.client.get(self.url("/merchants")))
            .await?;

        self.inner
            .cache
            .insert(
                CacheKey::Merchant,
                CacheValue::Merchant(Box::new(merchant.clone())),
            )
            .await;

        Ok(merchant)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Get a page of products (1-based).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, page: u32) -> Result<ProductCollection, CommerceError> {
        let page = page.max(1);
        let limit = self.inner.products_per_page;
        let cache_key = CacheKey::Products { limit, page };

        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let url = self.url(&format!("/products?limit={limit}&page={page}"));
        let products: ProductCollection = self.send(self.inner.client.get(url)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    // =========================================================================
    // Cart Methods (not cached - mutable state)
    // =========================================================================

    /// Create a new, empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_cart(&self) -> Result<Cart, CommerceError> {
        self.send(self.inner.client.get(self.url("/carts"))).await
    }

    /// Get an existing cart.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the cart is unknown or expired,
    /// or another error if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn retrieve_cart(&self, cart_id: &CartId) -> Result<Cart, CommerceError> {
        self.send(
            self.inner
                .client
                .get(self.url(&format!("/carts/{cart_id}"))),
        )
        .await
    }

    /// Add a product to a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or Chec rejects the change.
    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, CommerceError> {
        let body = AddToCartBody {
            id: product_id,
            quantity,
        };
        let request = self
            .inner
            .client
            .post(self.url(&format!("/carts/{cart_id}")))
            .json(&body);
        self.mutate(request).await
    }

    /// Set the quantity of a line item. A quantity of 0 removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or Chec rejects the change.
    #[instrument(skip(self), fields(cart_id = %cart_id, line_item_id = %line_item_id))]
    pub async fn update_cart_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, CommerceError> {
        let request = self
            .inner
            .client
            .put(self.url(&format!("/carts/{cart_id}/items/{line_item_id}")))
            .json(&UpdateLineItemBody { quantity });
        self.mutate(request).await
    }

    /// Remove a line item from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or Chec rejects the change.
    #[instrument(skip(self), fields(cart_id = %cart_id, line_item_id = %line_item_id))]
    pub async fn remove_from_cart(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
    ) -> Result<Cart, CommerceError> {
        let request = self
            .inner
            .client
            .delete(self.url(&format!("/carts/{cart_id}/items/{line_item_id}")));
        self.mutate(request).await
    }

    /// Remove every line item from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or Chec rejects the change.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn empty_cart(&self, cart_id: &CartId) -> Result<Cart, CommerceError> {
        let request = self
            .inner
            .client
            .delete(self.url(&format!("/carts/{cart_id}/items")));
        self.mutate(request).await
    }

    /// Send a cart mutation and unwrap the cart from its envelope.
    async fn mutate(&self, request: reqwest::RequestBuilder) -> Result<Cart, CommerceError> {
        let mutation: CartMutation = self.send(request).await?;
        if !mutation.success {
            return Err(CommerceError::Api {
                status: StatusCode::OK.as_u16(),
                message: format!(
                    "Chec reported an unsuccessful {}",
                    mutation.event.as_deref().unwrap_or("cart mutation")
                ),
            });
        }
        debug!(event = ?mutation.event, total_items = mutation.cart.total_items, "Cart mutated");
        Ok(mutation.cart)
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate all cached merchant and product data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

/// Map a non-success response to a `CommerceError`.
fn error_from_response(status: StatusCode, body: &str) -> CommerceError {
    let message = serde_json::from_str::<ApiErrorBody>(body).map_or_else(
        |_| {
            let raw = preview(body);
            if raw.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {raw}")
            }
        },
        |parsed| format_api_error(&parsed),
    );

    if status == StatusCode::NOT_FOUND {
        CommerceError::NotFound(message)
    } else {
        CommerceError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_not_found_maps_to_not_found() {
        let err = error_from_response(
            StatusCode::NOT_FOUND,
            r#"{"status_code":404,"error":{"type":"not_found","message":"Cart not found"}}"#,
        );
        assert!(matches!(err, CommerceError::NotFound(ref m) if m == "Cart not found"));
    }

    #[test]
    fn test_server_error_keeps_status() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "upstream exploded");
        match err {
            CommerceError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "HTTP 502 Bad Gateway: upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_error_body() {
        let err = error_from_response(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(
            err,
            CommerceError::Api { status: 401, ref message } if message == "HTTP 401 Unauthorized"
        ));
    }

    #[test]
    fn test_preview_truncates() {
        let body = "x".repeat(BODY_PREVIEW_CHARS * 2);
        assert_eq!(preview(&body).len(), BODY_PREVIEW_CHARS);
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = CommerceClient::new(&ChecConfig {
            api_url: "https://api.chec.io/v1/".to_string(),
            public_key: SecretString::from("pk_184625ed86f36703d7d233bcf6d519a8ea2d9f4e3e2b1"),
            products_per_page: 20,
            cache_ttl: Duration::from_secs(60),
        });
        assert_eq!(client.url("/merchants"), "https://api.chec.io/v1/merchants");
    }
}
