//! Integration tests for Seedling.
//!
//! The tests run the storefront against [`FakeChec`], an in-process axum
//! server that speaks the subset of the Chec REST API the storefront uses.
//! The fake keeps carts in memory, counts requests per endpoint and can be
//! told to fail individual endpoints or forget (expire) a cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p seedling-integration-tests
//! ```
//!
//! No network access or Chec account is needed.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};

use seedling_storefront::config::{ChecConfig, StorefrontConfig};
use seedling_storefront::state::AppState;

/// Public key the fake Chec API accepts.
pub const TEST_PUBLIC_KEY: &str = "pk_test_5b1f0c9a7e3d4b2a8c6f1e0d9b7a5c3e";

/// Business name of the fake merchant.
pub const MERCHANT_NAME: &str = "Seedling Goods";

/// Client IP sent with every storefront request (the rate limiter keys on it).
pub const TEST_CLIENT_IP: &str = "203.0.113.10";

// =============================================================================
// Fake Chec API
// =============================================================================

/// Endpoints of the fake Chec API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Merchant,
    Products,
    CreateCart,
    RetrieveCart,
    AddToCart,
    UpdateItem,
    RemoveItem,
    EmptyCart,
}

/// A product in the fake catalogue.
pub struct FakeProduct {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_cents: u64,
    /// `Some(0)` makes the product sold out.
    pub available: Option<i64>,
}

/// The fake catalogue, in listing order.
pub const PRODUCTS: &[FakeProduct] = &[
    FakeProduct {
        id: "prod_beeswax_candle",
        name: "Beeswax Candle",
        description: "<p>Hand-poured <strong>beeswax</strong> candle.</p>",
        price_cents: 1200,
        available: None,
    },
    FakeProduct {
        id: "prod_oat_soap",
        name: "Oat Soap",
        description: "<p>Cold-process soap with oats.</p>",
        price_cents: 850,
        available: None,
    },
    FakeProduct {
        id: "prod_lip_balm",
        name: "Lip Balm",
        description: "<p>Back in spring.</p>",
        price_cents: 400,
        available: Some(0),
    },
];

struct FakeLine {
    id: String,
    product_id: &'static str,
    quantity: u32,
}

#[derive(Default)]
struct FakeCart {
    lines: Vec<FakeLine>,
}

#[derive(Default)]
struct FakeData {
    carts: HashMap<String, FakeCart>,
    next_id: u64,
    failing: HashSet<Endpoint>,
    requests: HashMap<Endpoint, usize>,
}

impl FakeData {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }
}

type Shared = Arc<Mutex<FakeData>>;

fn lock(data: &Shared) -> MutexGuard<'_, FakeData> {
    data.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process fake of the Chec REST API.
#[derive(Clone)]
pub struct FakeChec {
    addr: SocketAddr,
    data: Shared,
}

impl FakeChec {
    /// Start the fake on an ephemeral local port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let data = Shared::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake Chec listener");
        let addr = listener
            .local_addr()
            .expect("Fake Chec listener has no local address");

        let app = fake_router(data.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, data }
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Make an endpoint answer with a 500 until [`recover`](Self::recover).
    pub fn fail(&self, endpoint: Endpoint) {
        lock(&self.data).failing.insert(endpoint);
    }

    /// Stop failing an endpoint.
    pub fn recover(&self, endpoint: Endpoint) {
        lock(&self.data).failing.remove(&endpoint);
    }

    /// Forget a cart, as Chec does when it expires.
    pub fn expire_cart(&self, cart_id: &str) {
        lock(&self.data).carts.remove(cart_id);
    }

    /// IDs of every live cart.
    #[must_use]
    pub fn cart_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = lock(&self.data).carts.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of requests an endpoint has received (including rejected ones).
    #[must_use]
    pub fn requests(&self, endpoint: Endpoint) -> usize {
        lock(&self.data)
            .requests
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }
}

fn fake_router(data: Shared) -> Router {
    Router::new()
        .route("/v1/merchants", get(merchant))
        .route("/v1/products", get(products))
        .route("/v1/carts", get(create_cart))
        .route("/v1/carts/{cart_id}", get(retrieve_cart).post(add_to_cart))
        .route("/v1/carts/{cart_id}/items", delete(empty_cart))
        .route(
            "/v1/carts/{cart_id}/items/{item_id}",
            put(update_item).delete(remove_item),
        )
        .with_state(data)
}

fn error_response(status: StatusCode, kind: &str, message: &str, errors: &Value) -> Response {
    (
        status,
        Json(json!({
            "status_code": status.as_u16(),
            "error": {
                "type": kind,
                "message": message,
                "errors": errors,
            }
        })),
    )
        .into_response()
}

fn cart_not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "not_found",
        "Cart not found",
        &json!({}),
    )
}

/// Record the request and apply auth and failure injection.
fn begin<'a>(
    data: &'a Shared,
    headers: &HeaderMap,
    endpoint: Endpoint,
) -> Result<MutexGuard<'a, FakeData>, Response> {
    let mut guard = lock(data);
    *guard.requests.entry(endpoint).or_default() += 1;

    let key = headers
        .get("x-authorization")
        .and_then(|v| v.to_str().ok());
    if key != Some(TEST_PUBLIC_KEY) {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            "You did not provide an API key.",
            &json!({}),
        ));
    }

    if guard.failing.contains(&endpoint) {
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Injected failure",
            &json!({}),
        ));
    }

    Ok(guard)
}

fn price_json(cents: u64) -> Value {
    let formatted = format!("{}.{:02}", cents / 100, cents % 100);
    json!({
        "raw": formatted,
        "formatted": formatted,
        "formatted_with_symbol": format!("${formatted}"),
        "formatted_with_code": format!("{formatted} USD"),
    })
}

fn find_product(id: &str) -> Option<&'static FakeProduct> {
    PRODUCTS.iter().find(|p| p.id == id)
}

fn product_json(product: &FakeProduct) -> Value {
    json!({
        "id": product.id,
        "name": product.name,
        "description": product.description,
        "permalink": product.id.trim_start_matches("prod_"),
        "price": price_json(product.price_cents),
        "inventory": {
            "managed": product.available.is_some(),
            "available": product.available.unwrap_or(0),
        },
        "image": {
            "url": format!("https://cdn.chec.io/merchants/1/assets/{}.jpg", product.id),
        },
    })
}

fn cart_json(id: &str, cart: &FakeCart) -> Value {
    let mut subtotal = 0;
    let mut total_items = 0;
    let line_items: Vec<Value> = cart
        .lines
        .iter()
        .filter_map(|line| {
            let product = find_product(line.product_id)?;
            let line_total = product.price_cents * u64::from(line.quantity);
            subtotal += line_total;
            total_items += line.quantity;
            Some(json!({
                "id": line.id,
                "product_id": product.id,
                "name": product.name,
                "quantity": line.quantity,
                "price": price_json(product.price_cents),
                "line_total": price_json(line_total),
            }))
        })
        .collect();

    json!({
        "id": id,
        "created": 1_760_000_000,
        "updated": 1_760_000_000,
        "expires": 1_762_592_000,
        "total_items": total_items,
        "total_unique_items": line_items.len(),
        "subtotal": price_json(subtotal),
        "currency": {"code": "USD", "symbol": "$"},
        "hosted_checkout_url": format!("https://checkout.chec.io/{id}"),
        "line_items": line_items,
    })
}

fn mutation_json(event: &str, id: &str, cart: &FakeCart) -> Response {
    Json(json!({
        "success": true,
        "event": event,
        "cart": cart_json(id, cart),
    }))
    .into_response()
}

async fn merchant(State(data): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = begin(&data, &headers, Endpoint::Merchant) {
        return response;
    }
    Json(json!({
        "id": 1,
        "business_name": MERCHANT_NAME,
        "business_description": "<p>Small-batch goods for slow mornings.</p>",
        "support_email": "hello@seedling.test",
        "currency": {"code": "USD", "symbol": "$"},
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ProductsQuery {
    limit: Option<usize>,
    page: Option<usize>,
}

async fn products(
    State(data): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<ProductsQuery>,
) -> Response {
    if let Err(response) = begin(&data, &headers, Endpoint::Products) {
        return response;
    }

    let limit = query.limit.unwrap_or(20).max(1);
    let page = query.page.unwrap_or(1).max(1);
    let items: Vec<Value> = PRODUCTS
        .iter()
        .skip((page - 1) * limit)
        .take(limit)
        .map(product_json)
        .collect();
    let total_pages = PRODUCTS.len().div_ceil(limit);

    Json(json!({
        "data": items,
        "meta": {
            "pagination": {
                "total": PRODUCTS.len(),
                "count": items.len(),
                "per_page": limit,
                "current_page": page,
                "total_pages": total_pages,
            }
        }
    }))
    .into_response()
}

async fn create_cart(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let mut guard = match begin(&data, &headers, Endpoint::CreateCart) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let id = guard.next_id("cart");
    let cart = FakeCart::default();
    let body = cart_json(&id, &cart);
    guard.carts.insert(id, cart);
    Json(body).into_response()
}

async fn retrieve_cart(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(cart_id): Path<String>,
) -> Response {
    let guard = match begin(&data, &headers, Endpoint::RetrieveCart) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    guard.carts.get(&cart_id).map_or_else(cart_not_found, |cart| {
        Json(cart_json(&cart_id, cart)).into_response()
    })
}

#[derive(Deserialize)]
struct AddBody {
    id: String,
    quantity: u32,
}

async fn add_to_cart(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(cart_id): Path<String>,
    Json(body): Json<AddBody>,
) -> Response {
    let mut guard = match begin(&data, &headers, Endpoint::AddToCart) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Some(product) = find_product(&body.id) else {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation",
            "The given data was invalid.",
            &json!({"id": ["The selected id is invalid."]}),
        );
    };
    if !guard.carts.contains_key(&cart_id) {
        return cart_not_found();
    }

    let line_id = guard.next_id("item");
    let Some(cart) = guard.carts.get_mut(&cart_id) else {
        return cart_not_found();
    };
    if let Some(line) = cart.lines.iter_mut().find(|l| l.product_id == product.id) {
        line.quantity += body.quantity;
    } else {
        cart.lines.push(FakeLine {
            id: line_id,
            product_id: product.id,
            quantity: body.quantity,
        });
    }
    mutation_json("Cart.Item.Added", &cart_id, cart)
}

#[derive(Deserialize)]
struct UpdateBody {
    quantity: u32,
}

async fn update_item(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path((cart_id, item_id)): Path<(String, String)>,
    Json(body): Json<UpdateBody>,
) -> Response {
    let mut guard = match begin(&data, &headers, Endpoint::UpdateItem) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Some(cart) = guard.carts.get_mut(&cart_id) else {
        return cart_not_found();
    };
    let Some(position) = cart.lines.iter().position(|l| l.id == item_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            "Line item not found",
            &json!({}),
        );
    };
    if body.quantity == 0 {
        cart.lines.remove(position);
    } else if let Some(line) = cart.lines.get_mut(position) {
        line.quantity = body.quantity;
    }
    mutation_json("Cart.Item.Updated", &cart_id, cart)
}

async fn remove_item(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path((cart_id, item_id)): Path<(String, String)>,
) -> Response {
    let mut guard = match begin(&data, &headers, Endpoint::RemoveItem) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Some(cart) = guard.carts.get_mut(&cart_id) else {
        return cart_not_found();
    };
    cart.lines.retain(|l| l.id != item_id);
    mutation_json("Cart.Item.Removed", &cart_id, cart)
}

async fn empty_cart(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(cart_id): Path<String>,
) -> Response {
    let mut guard = match begin(&data, &headers, Endpoint::EmptyCart) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Some(cart) = guard.carts.get_mut(&cart_id) else {
        return cart_not_found();
    };
    cart.lines.clear();
    mutation_json("Cart.Emptied", &cart_id, cart)
}

// =============================================================================
// Storefront Test Context
// =============================================================================

/// Chec client configuration pointing at a fake API.
///
/// Two products per page so the three-product catalogue spans two pages.
#[must_use]
pub fn chec_config(api_url: &str) -> ChecConfig {
    ChecConfig {
        api_url: api_url.to_string(),
        public_key: SecretString::from(TEST_PUBLIC_KEY),
        products_per_page: 2,
        cache_ttl: Duration::from_secs(60),
    }
}

/// Storefront configuration pointing at a fake API.
#[must_use]
pub fn storefront_config(api_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../storefront/static")),
        chec: chec_config(api_url),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A running storefront wired to a fresh fake Chec API.
pub struct TestContext {
    pub chec: FakeChec,
    pub client: reqwest::Client,
    pub storefront_url: String,
}

impl TestContext {
    /// Start a fake Chec API and a storefront in front of it.
    ///
    /// The client keeps cookies (one visitor session) and does not follow
    /// redirects, so tests can assert on them.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot be started.
    pub async fn new() -> Self {
        let chec = FakeChec::start().await;
        let state = AppState::new(storefront_config(&chec.api_url()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind storefront listener");
        let addr = listener
            .local_addr()
            .expect("Storefront listener has no local address");
        let app = seedling_storefront::app(state)
            .into_make_service_with_connect_info::<std::net::SocketAddr>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            chec,
            client: visitor_client(),
            storefront_url: format!("http://{addr}"),
        }
    }

    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.storefront_url)
    }

    /// GET a storefront path and return the response.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// GET a storefront path and return the body, asserting a 200.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or does not answer 200.
    pub async fn get_html(&self, path: &str) -> String {
        let response = self.get(path).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK, "GET {path}");
        response.text().await.expect("Failed to read body")
    }

    /// POST a form to a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Current cart count badge value.
    ///
    /// # Panics
    ///
    /// Panics if the badge cannot be fetched or parsed.
    pub async fn cart_count(&self) -> u32 {
        let html = self.get_html("/cart/count").await;
        html.split(['>', '<'])
            .nth(2)
            .and_then(|count| count.trim().parse().ok())
            .expect("badge is not a number")
    }

    /// Line item IDs shown on the cart page, in display order.
    ///
    /// # Panics
    ///
    /// Panics if the cart page cannot be fetched.
    pub async fn line_item_ids(&self) -> Vec<String> {
        let html = self.get_html("/cart").await;
        extract_values(&html, "name=\"line_item_id\" value=\"")
            .into_iter()
            .fold(Vec::new(), |mut ids, id| {
                if !ids.contains(&id) {
                    ids.push(id);
                }
                ids
            })
    }
}

/// Build the HTTP client a visitor uses, behind a proxy reporting
/// `TEST_CLIENT_IP`.
#[must_use]
pub fn visitor_client() -> reqwest::Client {
    visitor_client_from(Some(TEST_CLIENT_IP))
}

/// Build a visitor client. With `forwarded_for` set, every request carries it
/// as `x-forwarded-for`; with `None` the visitor connects directly.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn visitor_client_from(forwarded_for: Option<&'static str>) -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(ip) = forwarded_for {
        headers.insert(
            "x-forwarded-for",
            reqwest::header::HeaderValue::from_static(ip),
        );
    }

    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// Values following every occurrence of `marker` up to the next quote.
fn extract_values(html: &str, marker: &str) -> Vec<String> {
    html.match_indices(marker)
        .filter_map(|(index, _)| {
            let rest = html.get(index + marker.len()..)?;
            rest.split('"').next().map(String::from)
        })
        .collect()
}
