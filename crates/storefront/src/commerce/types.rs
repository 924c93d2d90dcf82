//! Domain types for the Chec API.
//!
//! These mirror the JSON payloads Chec returns. Only the fields the
//! storefront displays are decoded; everything else is ignored. Optional
//! fields default so that a sparse payload still decodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use seedling_core::{CartId, Currency, LineItemId, Price, ProductId};

// =============================================================================
// Merchant Types
// =============================================================================

/// Merchant details (`merchants.about()`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    /// Numeric merchant ID.
    pub id: u64,
    /// Store display name.
    #[serde(default)]
    pub business_name: String,
    /// Store tagline or description.
    #[serde(default)]
    pub business_description: Option<String>,
    /// Customer support email.
    #[serde(default)]
    pub support_email: Option<String>,
    /// Store currency.
    #[serde(default)]
    pub currency: Currency,
    /// Logo URL.
    #[serde(default)]
    pub logo: Option<String>,
    /// Cover image URL.
    #[serde(default)]
    pub cover: Option<String>,
}

// =============================================================================
// Product Types
// =============================================================================

/// Primary media attached to a product or line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    /// Media type (e.g., "image").
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Media URL.
    #[serde(default)]
    pub source: Option<String>,
}

/// An uploaded image asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Asset URL.
    pub url: String,
}

/// Inventory settings for a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// Whether Chec tracks stock for this product.
    #[serde(default)]
    pub managed: bool,
    /// Units available when managed.
    #[serde(default)]
    pub available: i64,
}

/// A product (`products.list()` item).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID (`prod_…`).
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Description (HTML authored in the Chec dashboard).
    #[serde(default)]
    pub description: String,
    /// URL-friendly permalink.
    #[serde(default)]
    pub permalink: Option<String>,
    /// Base price.
    pub price: Price,
    /// Stock information.
    #[serde(default)]
    pub inventory: Inventory,
    /// Primary media.
    #[serde(default)]
    pub media: Option<Media>,
    /// Primary image asset (newer API versions).
    #[serde(default)]
    pub image: Option<Asset>,
    /// Stock keeping unit.
    #[serde(default)]
    pub sku: Option<String>,
}

impl Product {
    /// URL of the product's primary image, if any.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        image_url(self.image.as_ref(), self.media.as_ref())
    }

    /// Whether the product can currently be added to a cart.
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.inventory.managed && self.inventory.available <= 0
    }
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Total number of records.
    pub total: u32,
    /// Records on this page.
    pub count: u32,
    /// Requested page size.
    pub per_page: u32,
    /// 1-based page number.
    pub current_page: u32,
    /// Number of pages.
    pub total_pages: u32,
}

/// Metadata attached to list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMeta {
    /// Pagination details.
    pub pagination: Pagination,
}

/// A page of products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCollection {
    /// Products on this page.
    #[serde(default)]
    pub data: Vec<Product>,
    /// Pagination metadata (absent when the store has no products).
    #[serde(default)]
    pub meta: Option<ListMeta>,
}

impl ProductCollection {
    /// Current page number (1 when unknown).
    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.meta
            .as_ref()
            .map_or(1, |m| m.pagination.current_page.max(1))
    }

    /// Total number of pages (1 when unknown).
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.meta
            .as_ref()
            .map_or(1, |m| m.pagination.total_pages.max(1))
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// A line item in a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Line item ID (`item_…`).
    pub id: LineItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Quantity in the cart.
    pub quantity: u32,
    /// Unit price.
    pub price: Price,
    /// `price * quantity`.
    pub line_total: Price,
    /// Product permalink.
    #[serde(default)]
    pub permalink: Option<String>,
    /// Primary image asset.
    #[serde(default)]
    pub image: Option<Asset>,
    /// Primary media (older API versions).
    #[serde(default)]
    pub media: Option<Media>,
}

impl LineItem {
    /// URL of the line item's image, if any.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        image_url(self.image.as_ref(), self.media.as_ref())
    }
}

/// A cart (`cart.retrieve()` and every cart mutation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID (`cart_…`).
    pub id: CartId,
    /// Creation time.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub updated: Option<DateTime<Utc>>,
    /// Time after which Chec discards the cart.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires: Option<DateTime<Utc>>,
    /// Sum of all line item quantities.
    pub total_items: u32,
    /// Number of distinct line items.
    #[serde(default)]
    pub total_unique_items: u32,
    /// Cart subtotal.
    pub subtotal: Price,
    /// Cart currency.
    #[serde(default)]
    pub currency: Currency,
    /// Chec-hosted checkout page for this cart.
    #[serde(default)]
    pub hosted_checkout_url: Option<String>,
    /// Line items.
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl Cart {
    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Find a line item by ID.
    #[must_use]
    pub fn line_item(&self, id: &LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|line| &line.id == id)
    }
}

/// Envelope returned by cart mutations (`add`, `update`, `remove`, `empty`).
///
/// Only the embedded cart is consumed; the rest describes the event.
#[derive(Debug, Clone, Deserialize)]
pub struct CartMutation {
    /// Whether Chec applied the change.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Event name (e.g., "Cart.Item.Added").
    #[serde(default)]
    pub event: Option<String>,
    /// The cart after the change.
    pub cart: Cart,
}

/// Request body for `cart.add()`.
#[derive(Debug, Clone, Serialize)]
pub struct AddToCartBody<'a> {
    /// Product to add.
    pub id: &'a ProductId,
    /// Quantity to add.
    pub quantity: u32,
}

/// Request body for `cart.update()`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateLineItemBody {
    /// New quantity (0 removes the line).
    pub quantity: u32,
}

const fn default_true() -> bool {
    true
}

fn image_url<'a>(image: Option<&'a Asset>, media: Option<&'a Media>) -> Option<&'a str> {
    image
        .map(|asset| asset.url.as_str())
        .or_else(|| media.and_then(|m| m.source.as_deref()))
        .filter(|url| !url.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CART_JSON: &str = r#"{
        "id": "cart_ZRZ4OaAXvlKp5m",
        "created": 1700000000,
        "updated": 1700000100,
        "expires": 1702592000,
        "total_items": 3,
        "total_unique_items": 2,
        "subtotal": {"raw": 44, "formatted": "44.00", "formatted_with_symbol": "$44.00", "formatted_with_code": "44.00 USD"},
        "currency": {"code": "USD", "symbol": "$"},
        "hosted_checkout_url": "https://checkout.chec.io/cart/cart_ZRZ4OaAXvlKp5m",
        "discount": [],
        "line_items": [
            {
                "id": "item_7RyWOwmK5nEa2V",
                "product_id": "prod_NqKE50BR4wdgBL",
                "name": "Pineapple Tee",
                "product_name": "Pineapple Tee",
                "quantity": 2,
                "price": {"raw": 12, "formatted_with_symbol": "$12.00"},
                "line_total": {"raw": 24, "formatted_with_symbol": "$24.00"},
                "media": {"type": "image", "source": "https://cdn.chec.io/tee.png"},
                "selected_options": []
            },
            {
                "id": "item_1ypbroE658n4ea",
                "product_id": "prod_kpnNwAMNZwmXB3",
                "name": "Sticker Pack",
                "quantity": 1,
                "price": {"raw": 20, "formatted_with_symbol": "$20.00"},
                "line_total": {"raw": 20, "formatted_with_symbol": "$20.00"},
                "image": {"url": "https://cdn.chec.io/stickers.png"}
            }
        ]
    }"#;

    #[test]
    fn test_deserialize_cart() {
        let cart: Cart = serde_json::from_str(CART_JSON).unwrap();
        assert_eq!(cart.id.as_str(), "cart_ZRZ4OaAXvlKp5m");
        assert_eq!(cart.total_items, 3);
        assert_eq!(cart.line_items.len(), 2);
        assert_eq!(cart.subtotal.display(), "$44.00");
        assert_eq!(cart.created.unwrap().timestamp(), 1_700_000_000);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_line_item_image_sources() {
        let cart: Cart = serde_json::from_str(CART_JSON).unwrap();
        let tee = cart
            .line_item(&LineItemId::parse("item_7RyWOwmK5nEa2V").unwrap())
            .unwrap();
        assert_eq!(tee.image_url(), Some("https://cdn.chec.io/tee.png"));

        let stickers = cart
            .line_item(&LineItemId::parse("item_1ypbroE658n4ea").unwrap())
            .unwrap();
        assert_eq!(stickers.image_url(), Some("https://cdn.chec.io/stickers.png"));
    }

    #[test]
    fn test_cart_session_roundtrip_keeps_timestamps() {
        let cart: Cart = serde_json::from_str(CART_JSON).unwrap();
        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.expires, cart.expires);
        assert_eq!(restored.line_items.len(), 2);
    }

    #[test]
    fn test_deserialize_mutation_envelope() {
        let json = format!(
            r#"{{"success": true, "event": "Cart.Item.Added", "line_item_id": "item_7RyWOwmK5nEa2V", "cart": {CART_JSON}}}"#
        );
        let mutation: CartMutation = serde_json::from_str(&json).unwrap();
        assert!(mutation.success);
        assert_eq!(mutation.event.as_deref(), Some("Cart.Item.Added"));
        assert_eq!(mutation.cart.total_items, 3);
    }

    #[test]
    fn test_deserialize_sparse_product() {
        let json = r#"{
            "id": "prod_NqKE50BR4wdgBL",
            "name": "Pineapple Tee",
            "price": {"raw": 12.5}
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.image_url(), None);
        assert!(!product.is_sold_out());
        assert_eq!(product.price.display(), "12.50");
    }

    #[test]
    fn test_sold_out_only_when_managed() {
        let json = r#"{
            "id": "prod_NqKE50BR4wdgBL",
            "name": "Pineapple Tee",
            "price": {"raw": 12},
            "inventory": {"managed": true, "available": 0}
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(product.is_sold_out());
    }

    #[test]
    fn test_product_collection_pagination_defaults() {
        let empty: ProductCollection = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert_eq!(empty.current_page(), 1);
        assert_eq!(empty.total_pages(), 1);

        let paged: ProductCollection = serde_json::from_str(
            r#"{"data": [], "meta": {"pagination": {"total": 45, "count": 20, "per_page": 20, "current_page": 2, "total_pages": 3}}}"#,
        )
        .unwrap();
        assert_eq!(paged.current_page(), 2);
        assert_eq!(paged.total_pages(), 3);
    }

    #[test]
    fn test_merchant_defaults() {
        let merchant: Merchant =
            serde_json::from_str(r#"{"id": 18462, "business_name": "Seedling Goods"}"#).unwrap();
        assert_eq!(merchant.business_name, "Seedling Goods");
        assert_eq!(merchant.currency.code, "USD");
        assert!(merchant.business_description.is_none());
    }
}
