//! Integration tests for the Chec API client.
//!
//! These run `CommerceClient` against the in-process fake Chec API.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use seedling_core::{CartId, LineItemId, ProductId};
use seedling_integration_tests::{Endpoint, FakeChec, MERCHANT_NAME, chec_config};
use seedling_storefront::commerce::{CommerceClient, CommerceError};

async fn client() -> (FakeChec, CommerceClient) {
    let chec = FakeChec::start().await;
    let client = CommerceClient::new(&chec_config(&chec.api_url()));
    (chec, client)
}

fn product(id: &str) -> ProductId {
    ProductId::parse(id).unwrap()
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_about_merchant_is_cached() {
    let (chec, client) = client().await;

    let merchant = client.about_merchant().await.unwrap();
    assert_eq!(merchant.business_name, MERCHANT_NAME);
    assert_eq!(merchant.currency.code, "USD");

    client.about_merchant().await.unwrap();
    assert_eq!(chec.requests(Endpoint::Merchant), 1);
}

#[tokio::test]
async fn test_invalidate_all_refetches() {
    let (chec, client) = client().await;

    client.about_merchant().await.unwrap();
    client.invalidate_all().await;
    client.about_merchant().await.unwrap();

    assert_eq!(chec.requests(Endpoint::Merchant), 2);
}

#[tokio::test]
async fn test_list_products_paginates() {
    let (chec, client) = client().await;

    let first = client.list_products(1).await.unwrap();
    assert_eq!(first.data.len(), 2);
    assert_eq!(first.current_page(), 1);
    assert_eq!(first.total_pages(), 2);
    assert_eq!(first.data[0].name, "Beeswax Candle");
    assert_eq!(first.data[0].price.display(), "$12.00");

    let second = client.list_products(2).await.unwrap();
    assert_eq!(second.data.len(), 1);
    assert_eq!(second.current_page(), 2);
    assert!(second.data[0].is_sold_out());

    // Each page is cached separately
    client.list_products(1).await.unwrap();
    client.list_products(2).await.unwrap();
    assert_eq!(chec.requests(Endpoint::Products), 2);
}

#[tokio::test]
async fn test_page_zero_is_first_page() {
    let (_chec, client) = client().await;

    let products = client.list_products(0).await.unwrap();
    assert_eq!(products.current_page(), 1);
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let (chec, client) = client().await;

    chec.fail(Endpoint::Merchant);
    let err = client.about_merchant().await.unwrap_err();
    assert!(matches!(err, CommerceError::Api { status: 500, .. }));

    chec.recover(Endpoint::Merchant);
    assert!(client.about_merchant().await.is_ok());
    assert_eq!(chec.requests(Endpoint::Merchant), 2);
}

// =============================================================================
// Carts
// =============================================================================

#[tokio::test]
async fn test_cart_lifecycle() {
    let (_chec, client) = client().await;

    let cart = client.create_cart().await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(cart.total_items, 0);

    let cart = client
        .add_to_cart(&cart.id, &product("prod_beeswax_candle"), 2)
        .await
        .unwrap();
    let cart = client
        .add_to_cart(&cart.id, &product("prod_oat_soap"), 1)
        .await
        .unwrap();
    assert_eq!(cart.total_items, 3);
    assert_eq!(cart.total_unique_items, 2);
    assert_eq!(cart.subtotal.display(), "$32.50");

    let candle = cart.line_items[0].id.clone();
    let cart = client.update_cart_item(&cart.id, &candle, 5).await.unwrap();
    assert_eq!(cart.line_item(&candle).unwrap().quantity, 5);
    assert_eq!(cart.total_items, 6);

    let cart = client.remove_from_cart(&cart.id, &candle).await.unwrap();
    assert!(cart.line_item(&candle).is_none());
    assert_eq!(cart.total_items, 1);

    let cart = client.empty_cart(&cart.id).await.unwrap();
    assert!(cart.is_empty());

    let retrieved = client.retrieve_cart(&cart.id).await.unwrap();
    assert_eq!(retrieved.id, cart.id);
    assert!(retrieved.is_empty());
}

#[tokio::test]
async fn test_update_to_zero_removes_line() {
    let (_chec, client) = client().await;

    let cart = client.create_cart().await.unwrap();
    let cart = client
        .add_to_cart(&cart.id, &product("prod_oat_soap"), 1)
        .await
        .unwrap();
    let line = cart.line_items[0].id.clone();

    let cart = client.update_cart_item(&cart.id, &line, 0).await.unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_retrieve_expired_cart_is_not_found() {
    let (chec, client) = client().await;

    let cart = client.create_cart().await.unwrap();
    chec.expire_cart(cart.id.as_str());

    let err = client.retrieve_cart(&cart.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_unknown_product_reports_validation_errors() {
    let (_chec, client) = client().await;

    let cart = client.create_cart().await.unwrap();
    let err = client
        .add_to_cart(&cart.id, &product("prod_missing"), 1)
        .await
        .unwrap_err();

    match err {
        CommerceError::Api { status, message } => {
            assert_eq!(status, 422);
            assert!(message.contains("The given data was invalid."));
            assert!(message.contains("id: The selected id is invalid."));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_line_item_is_not_found() {
    let (_chec, client) = client().await;

    let cart = client.create_cart().await.unwrap();
    let err = client
        .update_cart_item(&cart.id, &LineItemId::parse("item_999").unwrap(), 1)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_carts_are_never_cached() {
    let (chec, client) = client().await;

    let cart = client.create_cart().await.unwrap();
    client.retrieve_cart(&cart.id).await.unwrap();
    client.retrieve_cart(&cart.id).await.unwrap();

    assert_eq!(chec.requests(Endpoint::RetrieveCart), 2);
}

#[tokio::test]
async fn test_wrong_public_key_is_rejected() {
    let chec = FakeChec::start().await;
    let mut config = chec_config(&chec.api_url());
    config.public_key = SecretString::from("pk_wrong_9f8e7d6c5b4a39281706f5e4d3c2b1a0");
    let client = CommerceClient::new(&config);

    let err = client
        .retrieve_cart(&CartId::parse("cart_1").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Api { status: 401, .. }));
}
