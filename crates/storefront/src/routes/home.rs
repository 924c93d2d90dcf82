//! Storefront page route handler.
//!
//! The page is assembled from three independent Chec fetches (merchant,
//! products and the visitor's cart). Sections whose fetch failed fall back to
//! an empty placeholder; the cart falls back to the last snapshot in the
//! session.

use std::sync::LazyLock;

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use regex::Regex;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::commerce::{Merchant, Product, ProductCollection};
use crate::error::Result;
use crate::filters;
use crate::routes::cart::CartView;
use crate::services::cart::CartState;
use crate::services::catalog;
use crate::state::AppState;

/// Longest product description shown on a card, in characters.
const DESCRIPTION_MAX_CHARS: usize = 180;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

// =============================================================================
// View Types
// =============================================================================

/// Merchant display data for the hero section.
#[derive(Clone, Default)]
pub struct MerchantView {
    pub business_name: String,
    pub description: String,
}

impl From<&Merchant> for MerchantView {
    fn from(merchant: &Merchant) -> Self {
        Self {
            business_name: merchant.business_name.clone(),
            description: merchant
                .business_description
                .as_deref()
                .map(plain_text)
                .unwrap_or_default(),
        }
    }
}

/// Product card display data.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
    pub sold_out: bool,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: truncate(&plain_text(&product.description), DESCRIPTION_MAX_CHARS),
            price: product.price.display(),
            image_url: product.image_url().map(String::from),
            sold_out: product.is_sold_out(),
        }
    }
}

/// Pagination links for the product grid.
#[derive(Clone)]
pub struct PaginationView {
    pub current: u32,
    pub total: u32,
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

impl PaginationView {
    fn new(current: u32, total: u32) -> Self {
        Self {
            current,
            total,
            prev: (current > 1).then(|| current - 1),
            next: (current < total).then(|| current + 1),
        }
    }

    /// Whether there is more than one page to link between.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.total > 1
    }
}

impl From<&ProductCollection> for PaginationView {
    fn from(collection: &ProductCollection) -> Self {
        Self::new(collection.current_page(), collection.total_pages())
    }
}

/// Strip HTML tags and collapse whitespace.
fn plain_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

// =============================================================================
// Handler
// =============================================================================

/// Storefront page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub merchant: MerchantView,
    pub products: Vec<ProductView>,
    pub pagination: PaginationView,
    pub cart: CartView,
    pub is_cart_visible: bool,
    /// Where cart forms on this page send the visitor back to.
    pub return_to: String,
}

/// Query parameters for the storefront page.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// Display the storefront page.
#[instrument(skip(state, session))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> Result<HomeTemplate> {
    let page = query.page.unwrap_or(1).max(1);
    let cart = CartState::load(&session).await;

    let data = catalog::load_page(state.commerce(), cart, page).await;
    data.cart.save(&session).await?;

    let (products, pagination) = data.products.as_ref().map_or_else(
        || (Vec::new(), PaginationView::new(page, 0)),
        |collection| {
            (
                collection.data.iter().map(ProductView::from).collect(),
                PaginationView::from(collection),
            )
        },
    );

    Ok(HomeTemplate {
        merchant: data
            .merchant
            .as_ref()
            .map(MerchantView::from)
            .unwrap_or_default(),
        products,
        pagination,
        cart: CartView::from(&data.cart),
        is_cart_visible: data.cart.is_cart_visible,
        return_to: if page > 1 {
            format!("/?page={page}")
        } else {
            "/".to_string()
        },
    })
}
