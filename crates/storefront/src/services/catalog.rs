//! Page data loading.
//!
//! Rendering the storefront needs three independent Chec calls: merchant
//! details, a page of products and the visitor's cart. They run concurrently
//! and each one fails on its own; a failed fetch is logged and its section
//! renders from whatever state was already there.

use tracing::instrument;

use crate::commerce::{CommerceClient, Merchant, ProductCollection};
use crate::services::cart::CartState;

/// Everything the storefront page displays.
#[derive(Debug, Clone)]
pub struct PageData {
    /// Merchant details, `None` if the fetch failed.
    pub merchant: Option<Merchant>,
    /// Product page, `None` if the fetch failed.
    pub products: Option<ProductCollection>,
    /// Visitor cart state after the retrieve attempt.
    pub cart: CartState,
}

/// Fetch merchant details, logging failures.
#[instrument(skip(client))]
pub async fn fetch_merchant(client: &CommerceClient) -> Option<Merchant> {
    client
        .about_merchant()
        .await
        .map_err(|e| tracing::error!(error = %e, "There was an error fetching the merchant details"))
        .ok()
}

/// Fetch a page of products, logging failures.
#[instrument(skip(client))]
pub async fn fetch_products(client: &CommerceClient, page: u32) -> Option<ProductCollection> {
    client
        .list_products(page)
        .await
        .map_err(|e| tracing::error!(error = %e, "There was an error fetching the products"))
        .ok()
}

/// Load merchant, products and cart concurrently.
#[instrument(skip(client, cart))]
pub async fn load_page(client: &CommerceClient, mut cart: CartState, page: u32) -> PageData {
    let (merchant, products, _) = tokio::join!(
        fetch_merchant(client),
        fetch_products(client, page),
        cart.retrieve(client),
    );

    PageData {
        merchant,
        products,
        cart,
    }
}
