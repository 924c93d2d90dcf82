//! Per-visitor cart state.
//!
//! The storefront never computes cart contents itself. Each action issues a
//! single Chec call and, when it succeeds, replaces the stored snapshot with
//! the cart Chec returned. A failed call is logged and the snapshot is left
//! exactly as it was, so the visitor keeps seeing the last good cart.
//!
//! The state lives in the visitor's session. Concurrent requests from the
//! same visitor are not coordinated: whichever request saves last wins.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use seedling_core::{CartId, LineItemId, ProductId};

use crate::commerce::{Cart, CommerceClient, CommerceError};
use crate::error::add_breadcrumb;
use crate::models::session_keys;

/// A cart action forwarded to Chec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    Retrieve,
    Create,
    Add,
    Update,
    Remove,
    Empty,
}

impl CartAction {
    /// Short name used in logs and breadcrumbs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::Create => "create",
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Empty => "empty",
        }
    }

    /// Message logged when the action fails.
    #[must_use]
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::Retrieve => "There was an error fetching the cart",
            Self::Create => "There was an error creating the cart",
            Self::Add => "There was an error adding the item to the cart",
            Self::Update => "There was an error updating the cart items",
            Self::Remove => "There was an error removing the item from the cart",
            Self::Empty => "There was an error emptying the cart",
        }
    }
}

/// Cart state kept in the visitor's session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartState {
    /// Chec cart this visitor is using.
    pub cart_id: Option<CartId>,
    /// Last cart Chec returned for this visitor.
    pub cart: Option<Cart>,
    /// Whether the cart panel is open.
    pub is_cart_visible: bool,
}

impl CartState {
    /// Load the state from the session, starting fresh if absent or unreadable.
    pub async fn load(session: &Session) -> Self {
        match session.get::<Self>(session_keys::CART_STATE).await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to read cart state from session: {e}");
                Self::default()
            }
        }
    }

    /// Persist the state to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store rejects the write.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(session_keys::CART_STATE, self).await
    }

    /// Total quantity across all line items of the current snapshot.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.cart.as_ref().map_or(0, |cart| cart.total_items)
    }

    /// Flip the cart panel open or closed.
    pub const fn toggle_visibility(&mut self) {
        self.is_cart_visible = !self.is_cart_visible;
    }

    /// Record the outcome of a cart call.
    ///
    /// On success the returned cart becomes the snapshot (and its ID the
    /// visitor's cart). On failure the error is logged and nothing changes.
    /// Returns whether the state changed.
    pub fn apply(&mut self, action: CartAction, result: Result<Cart, CommerceError>) -> bool {
        match result {
            Ok(cart) => {
                tracing::debug!(
                    action = action.as_str(),
                    cart_id = %cart.id,
                    total_items = cart.total_items,
                    "Cart updated"
                );
                self.cart_id = Some(cart.id.clone());
                self.cart = Some(cart);
                true
            }
            Err(e) => {
                tracing::error!(action = action.as_str(), error = %e, "{}", action.failure_message());
                false
            }
        }
    }

    /// Retrieve the visitor's cart, creating one if none exists.
    ///
    /// A stored cart that Chec no longer knows (expired or deleted) is
    /// replaced with a new one.
    #[instrument(skip_all)]
    pub async fn retrieve(&mut self, client: &CommerceClient) -> bool {
        let Some(cart_id) = self.cart_id.clone() else {
            return self.apply(CartAction::Create, client.create_cart().await);
        };

        match client.retrieve_cart(&cart_id).await {
            Err(e) if e.is_not_found() => {
                tracing::info!(cart_id = %cart_id, "Stored cart no longer exists, creating a new one");
                self.apply(CartAction::Create, client.create_cart().await)
            }
            result => self.apply(CartAction::Retrieve, result),
        }
    }

    /// Return the visitor's cart ID, creating a cart first if needed.
    async fn ensure_cart_id(&mut self, client: &CommerceClient) -> Option<CartId> {
        if self.cart_id.is_none() {
            self.apply(CartAction::Create, client.create_cart().await);
        }
        self.cart_id.clone()
    }

    /// Add a product to the cart.
    #[instrument(skip(self, client))]
    pub async fn add(
        &mut self,
        client: &CommerceClient,
        product_id: &ProductId,
        quantity: u32,
    ) -> bool {
        let Some(cart_id) = self.ensure_cart_id(client).await else {
            return false;
        };
        let applied = self.apply(
            CartAction::Add,
            client.add_to_cart(&cart_id, product_id, quantity).await,
        );
        if applied {
            add_breadcrumb(
                "cart",
                "Added item to cart",
                Some(&[("product_id", product_id.as_str())]),
            );
        }
        applied
    }

    /// Set the quantity of a line item.
    #[instrument(skip(self, client))]
    pub async fn update(
        &mut self,
        client: &CommerceClient,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> bool {
        let Some(cart_id) = self.ensure_cart_id(client).await else {
            return false;
        };
        let applied = self.apply(
            CartAction::Update,
            client
                .update_cart_item(&cart_id, line_item_id, quantity)
                .await,
        );
        if applied {
            add_breadcrumb(
                "cart",
                "Updated cart quantity",
                Some(&[("line_item_id", line_item_id.as_str())]),
            );
        }
        applied
    }

    /// Remove a line item.
    #[instrument(skip(self, client))]
    pub async fn remove(&mut self, client: &CommerceClient, line_item_id: &LineItemId) -> bool {
        let Some(cart_id) = self.ensure_cart_id(client).await else {
            return false;
        };
        let applied = self.apply(
            CartAction::Remove,
            client.remove_from_cart(&cart_id, line_item_id).await,
        );
        if applied {
            add_breadcrumb(
                "cart",
                "Removed item from cart",
                Some(&[("line_item_id", line_item_id.as_str())]),
            );
        }
        applied
    }

    /// Remove every line item.
    #[instrument(skip(self, client))]
    pub async fn empty(&mut self, client: &CommerceClient) -> bool {
        let Some(cart_id) = self.ensure_cart_id(client).await else {
            return false;
        };
        let applied = self.apply(CartAction::Empty, client.empty_cart(&cart_id).await);
        if applied {
            add_breadcrumb("cart", "Emptied cart", None);
        }
        applied
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cart_json(id: &str, total_items: u32) -> String {
        format!(
            r#"{{
                "id": "{id}",
                "total_items": {total_items},
                "subtotal": {{"raw": 0, "formatted_with_symbol": "$0.00"}},
                "line_items": []
            }}"#
        )
    }

    fn cart(id: &str, total_items: u32) -> Cart {
        serde_json::from_str(&cart_json(id, total_items)).unwrap()
    }

    #[test]
    fn test_default_state_is_empty_and_closed() {
        let state = CartState::default();
        assert!(state.cart_id.is_none());
        assert!(state.cart.is_none());
        assert!(!state.is_cart_visible);
        assert_eq!(state.total_items(), 0);
    }

    #[test]
    fn test_apply_success_replaces_snapshot() {
        let mut state = CartState::default();
        assert!(state.apply(CartAction::Create, Ok(cart("cart_first", 0))));
        assert!(state.apply(CartAction::Add, Ok(cart("cart_first", 2))));

        assert_eq!(state.cart_id.as_ref().unwrap().as_str(), "cart_first");
        assert_eq!(state.total_items(), 2);
    }

    #[test]
    fn test_apply_failure_keeps_prior_state() {
        let mut state = CartState::default();
        state.apply(CartAction::Add, Ok(cart("cart_first", 3)));

        let changed = state.apply(
            CartAction::Update,
            Err(CommerceError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
        );

        assert!(!changed);
        assert_eq!(state.cart_id.as_ref().unwrap().as_str(), "cart_first");
        assert_eq!(state.total_items(), 3);
    }

    #[test]
    fn test_apply_last_write_wins() {
        let mut state = CartState::default();
        state.apply(CartAction::Retrieve, Ok(cart("cart_old", 5)));
        state.apply(CartAction::Create, Ok(cart("cart_new", 0)));

        assert_eq!(state.cart_id.as_ref().unwrap().as_str(), "cart_new");
        assert_eq!(state.total_items(), 0);
    }

    #[test]
    fn test_toggle_visibility() {
        let mut state = CartState::default();
        state.toggle_visibility();
        assert!(state.is_cart_visible);
        state.toggle_visibility();
        assert!(!state.is_cart_visible);
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let actions = [
            CartAction::Retrieve,
            CartAction::Create,
            CartAction::Add,
            CartAction::Update,
            CartAction::Remove,
            CartAction::Empty,
        ];
        let mut messages: Vec<_> = actions.iter().map(|a| a.failure_message()).collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), actions.len());
    }

    #[test]
    fn test_state_serializes_for_session() {
        let mut state = CartState::default();
        state.apply(CartAction::Add, Ok(cart("cart_first", 1)));
        state.toggle_visibility();

        let json = serde_json::to_value(&state).unwrap();
        let restored: CartState = serde_json::from_value(json).unwrap();
        assert!(restored.is_cart_visible);
        assert_eq!(restored.total_items(), 1);
    }
}
