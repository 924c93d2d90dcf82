//! Cart route handlers.
//!
//! Every cart action is a plain HTML form post. The handler forwards the
//! action to Chec, stores the resulting snapshot in the session and redirects
//! (303) back to the page the form came from. A failed Chec call is logged by
//! the cart service and the visitor simply sees the previous cart again.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use seedling_core::{Currency, LineItemId, Price, ProductId};

use crate::commerce::{Cart, LineItem};
use crate::error::{AppError, Result};
use crate::filters;
use crate::services::cart::CartState;
use crate::services::catalog;
use crate::state::AppState;

/// Where to send the visitor when a form has no usable `return_to`.
const DEFAULT_RETURN_PATH: &str = "/";

// =============================================================================
// View Types
// =============================================================================

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
    pub image_url: Option<String>,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
    pub checkout_url: Option<String>,
    /// A Chec cart backs this view (false only before the first fetch).
    pub is_loaded: bool,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Price::zero(&Currency::default()).display(),
            item_count: 0,
            checkout_url: None,
            is_loaded: false,
        }
    }

    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.line_items.iter().map(CartItemView::from).collect(),
            subtotal: cart.subtotal.display(),
            item_count: cart.total_items,
            checkout_url: cart.hosted_checkout_url.clone(),
            is_loaded: true,
        }
    }
}

impl From<&CartState> for CartView {
    fn from(state: &CartState) -> Self {
        state.cart.as_ref().map_or_else(Self::empty, Self::from)
    }
}

impl From<&LineItem> for CartItemView {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name.clone(),
            quantity: item.quantity,
            price: item.price.display(),
            line_total: item.line_total.display(),
            image_url: item.image_url().map(String::from),
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
    pub return_to: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_item_id: String,
    pub quantity: u32,
    pub return_to: Option<String>,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_item_id: String,
    pub return_to: Option<String>,
}

/// Form data for actions without other fields (toggle, empty).
#[derive(Debug, Default, Deserialize)]
pub struct ReturnForm {
    pub return_to: Option<String>,
}

/// Pick the redirect target for a cart form.
///
/// Only same-origin absolute paths are accepted; anything else (including
/// protocol-relative `//host` URLs) falls back to `/`.
fn safe_return_path(return_to: Option<&str>) -> &str {
    match return_to {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => DEFAULT_RETURN_PATH,
    }
}

fn redirect_back(return_to: Option<&str>) -> Response {
    Redirect::to(safe_return_path(return_to)).into_response()
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub store_name: String,
    pub cart: CartView,
    pub return_to: String,
}

/// Cart count badge fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the standalone cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<CartShowTemplate> {
    let mut cart = CartState::load(&session).await;

    let (merchant, _) = tokio::join!(
        catalog::fetch_merchant(state.commerce()),
        cart.retrieve(state.commerce()),
    );
    cart.save(&session).await?;

    Ok(CartShowTemplate {
        store_name: merchant.map(|m| m.business_name).unwrap_or_default(),
        cart: CartView::from(&cart),
        return_to: "/cart".to_string(),
    })
}

/// Cart count badge, read from the session snapshot.
#[instrument(skip(session))]
pub async fn count(session: Session) -> CartCountTemplate {
    CartCountTemplate {
        count: CartState::load(&session).await.total_items(),
    }
}

/// Open or close the cart panel.
#[instrument(skip(session))]
pub async fn toggle(session: Session, Form(form): Form<ReturnForm>) -> Result<Response> {
    let mut cart = CartState::load(&session).await;
    cart.toggle_visibility();
    cart.save(&session).await?;

    Ok(redirect_back(form.return_to.as_deref()))
}

/// Add a product to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product_id = ProductId::parse(&form.product_id)?;
    let quantity = form.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1".to_string(),
        ));
    }

    let mut cart = CartState::load(&session).await;
    cart.add(state.commerce(), &product_id, quantity).await;
    cart.save(&session).await?;

    Ok(redirect_back(form.return_to.as_deref()))
}

/// Set the quantity of a cart line item.
///
/// A quantity of 0 is passed through to Chec, which removes the line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let line_item_id = LineItemId::parse(&form.line_item_id)?;

    let mut cart = CartState::load(&session).await;
    cart.update(state.commerce(), &line_item_id, form.quantity)
        .await;
    cart.save(&session).await?;

    Ok(redirect_back(form.return_to.as_deref()))
}

/// Remove a line item from the cart.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let line_item_id = LineItemId::parse(&form.line_item_id)?;

    let mut cart = CartState::load(&session).await;
    cart.remove(state.commerce(), &line_item_id).await;
    cart.save(&session).await?;

    Ok(redirect_back(form.return_to.as_deref()))
}

/// Remove every line item from the cart.
#[instrument(skip(state, session))]
pub async fn empty(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ReturnForm>,
) -> Result<Response> {
    let mut cart = CartState::load(&session).await;
    cart.empty(state.commerce()).await;
    cart.save(&session).await?;

    Ok(redirect_back(form.return_to.as_deref()))
}

/// Redirect to Chec's hosted checkout for the visitor's cart.
#[instrument(skip(state, session))]
pub async fn checkout(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let mut cart = CartState::load(&session).await;
    if cart.cart_id.is_none() {
        return Ok(Redirect::to("/cart"));
    }

    cart.retrieve(state.commerce()).await;
    cart.save(&session).await?;

    let checkout_url = cart
        .cart
        .as_ref()
        .filter(|c| !c.is_empty())
        .and_then(|c| c.hosted_checkout_url.as_deref());

    Ok(checkout_url.map_or_else(|| Redirect::to("/cart"), Redirect::to))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_return_path_accepts_local_paths() {
        assert_eq!(safe_return_path(Some("/")), "/");
        assert_eq!(safe_return_path(Some("/cart")), "/cart");
        assert_eq!(safe_return_path(Some("/?page=2")), "/?page=2");
    }

    #[test]
    fn test_safe_return_path_rejects_other_targets() {
        assert_eq!(safe_return_path(None), "/");
        assert_eq!(safe_return_path(Some("")), "/");
        assert_eq!(safe_return_path(Some("https://evil.example")), "/");
        assert_eq!(safe_return_path(Some("//evil.example")), "/");
        assert_eq!(safe_return_path(Some("/\\evil.example")), "/");
        assert_eq!(safe_return_path(Some("/cart\r\nSet-Cookie: x=y")), "/");
    }

    #[test]
    fn test_cart_view_from_cart() {
        let cart: Cart = serde_json::from_str(
            r#"{
                "id": "cart_abc",
                "total_items": 3,
                "subtotal": {"raw": 36, "formatted_with_symbol": "$36.00"},
                "hosted_checkout_url": "https://checkout.chec.io/cart_abc",
                "line_items": [{
                    "id": "item_1",
                    "product_id": "prod_candle",
                    "name": "Beeswax Candle",
                    "quantity": 3,
                    "price": {"raw": 12, "formatted_with_symbol": "$12.00"},
                    "line_total": {"raw": 36, "formatted_with_symbol": "$36.00"}
                }]
            }"#,
        )
        .unwrap();

        let view = CartView::from(&cart);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "$36.00");
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].id, "item_1");
        assert_eq!(view.items[0].line_total, "$36.00");
        assert!(!view.is_empty());
        assert!(view.is_loaded);
        assert_eq!(
            view.checkout_url.as_deref(),
            Some("https://checkout.chec.io/cart_abc")
        );
    }

    #[test]
    fn test_cart_view_without_snapshot_is_empty() {
        let view = CartView::from(&CartState::default());
        assert!(view.is_empty());
        assert_eq!(view.item_count, 0);
        assert_eq!(view.subtotal, "$0.00");
        assert!(!view.is_loaded);
    }
}
