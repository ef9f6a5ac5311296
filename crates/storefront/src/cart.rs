//! Session-scoped cart cache.
//!
//! A [`CartCache`] mirrors the server cart for one browsing context. The
//! server is the source of truth: quantities change locally only after the
//! server confirmed them, optimistic removals roll back on failure, and every
//! successful mutation publishes `cart-updated` so sibling contexts re-fetch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument};

use shoplink_core::{AccountId, CartItem, Price, TabSignal, VariantId, subtotal};

use crate::api::{AddToCartRequest, ApiClient};
use crate::bus::TabChannel;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::navigation::{Navigation, Navigator};

/// Path the login view returns to after a cart operation redirected there.
pub const CART_PATH: &str = "/cart";

/// Result of [`CartCache::remove_confirmed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// The user declined; nothing was sent.
    Cancelled,
}

/// Local mirror of the server cart.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct CartCache {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    navigator: Navigator,
    tab: TabChannel,
    items: RwLock<Vec<CartItem>>,
    /// Bumped on detach and logout; fetches started under an older epoch are
    /// discarded.
    epoch: AtomicU64,
    /// Bumped every time a fetched cart replaces the list.
    loads: AtomicU64,
}

impl CartCache {
    /// Create an empty cache. Call [`attach`](Self::attach) to follow bus
    /// signals.
    #[must_use]
    pub fn new(api: ApiClient, navigator: Navigator, tab: TabChannel) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                navigator,
                tab,
                items: RwLock::new(Vec::new()),
                epoch: AtomicU64::new(0),
                loads: AtomicU64::new(0),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Follow `cart-updated` (re-fetch) and `logout` (reset) signals.
    ///
    /// Calling it again replaces the previous subscription.
    pub fn attach(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.tab.subscribe(move |signal| {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let cart = Self { inner };
                match signal {
                    TabSignal::CartUpdated => {
                        debug!("Cart updated in another context, re-fetching");
                        // Failures are already reported by load
                        let _ = cart.load().await;
                    }
                    TabSignal::Logout => cart.handle_logout(),
                }
            }
        });
    }

    /// Stop following signals and ignore fetches still in flight.
    pub fn detach(&self) {
        self.inner.tab.unsubscribe();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Reset to the anonymous state and send the user to login.
    pub fn handle_logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.write().clear();
        info!("Logout received, cart cleared");
        self.inner.navigator.go(Navigation::Login { return_to: None });
    }

    fn account(&self) -> Result<AccountId> {
        let identity = self
            .inner
            .api
            .session()
            .require(&self.inner.navigator, CART_PATH)?;
        Ok(identity.account_id)
    }

    fn publish_update(&self) {
        self.inner.tab.publish(TabSignal::CartUpdated);
    }

    // =========================================================================
    // Server operations
    // =========================================================================

    /// Replace the local list with the server cart.
    ///
    /// On failure the previous list is kept. Selection flags survive for
    /// lines that are still present.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` without calling the API when signed out, or
    /// the API failure.
    #[instrument(skip_all)]
    pub async fn load(&self) -> Result<()> {
        let account_id = self.account()?;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        let mut fresh = self
            .inner
            .api
            .get_cart(account_id)
            .await
            .map_err(|e| ClientError::from(e).reported("cart.load"))?;

        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Discarding cart fetched before detach");
            return Ok(());
        }

        let mut items = self.write();
        for item in &mut fresh {
            item.is_selected = items
                .iter()
                .any(|old| old.product_variant_id == item.product_variant_id && old.is_selected);
        }
        debug!(lines = fresh.len(), "Cart loaded");
        *items = fresh;
        self.inner.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Change a line's quantity by `delta`, server first.
    ///
    /// The local quantity moves only after the server accepted the change.
    /// The whole cart is re-fetched instead when the line would drop to zero
    /// or below, is not known locally, or a load replaced the list while the
    /// request was in flight.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, the server rejection, or a transport error;
    /// local state is unchanged in every failure case.
    #[instrument(skip_all, fields(variant_id = %variant_id, delta = delta))]
    pub async fn mutate_quantity(&self, variant_id: VariantId, delta: i32) -> Result<()> {
        let account_id = self.account()?;
        let (variant, change) = (variant_id.to_string(), delta.to_string());
        add_breadcrumb(
            "cart",
            "Changed quantity",
            Some(&[("variant_id", variant.as_str()), ("delta", change.as_str())]),
        );
        let loads = self.inner.loads.load(Ordering::SeqCst);

        self.inner
            .api
            .change_quantity(account_id, variant_id, delta)
            .await
            .map_err(|e| ClientError::from(e).reported("cart.change_quantity"))?;

        let needs_refetch = {
            let mut items = self.write();
            let reloaded = self.inner.loads.load(Ordering::SeqCst) != loads;
            let line = items
                .iter_mut()
                .find(|item| item.product_variant_id == variant_id)
                .filter(|_| !reloaded);
            match line {
                Some(item) => match item.quantity.checked_add(delta) {
                    Some(quantity) if quantity > 0 => {
                        item.quantity = quantity;
                        false
                    }
                    _ => true,
                },
                None => true,
            }
        };

        self.publish_update();
        if needs_refetch {
            debug!("Local line stale or emptied, re-fetching cart");
            self.load().await?;
        }
        Ok(())
    }

    /// Remove a line immediately, then confirm with the server.
    ///
    /// If the server rejects or cannot be reached the list is restored to
    /// exactly what it was before.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, the server rejection, or a transport error.
    #[instrument(skip_all, fields(variant_id = %variant_id))]
    pub async fn remove_optimistic(&self, variant_id: VariantId) -> Result<()> {
        let account_id = self.account()?;
        let variant = variant_id.to_string();
        add_breadcrumb("cart", "Removed item", Some(&[("variant_id", variant.as_str())]));

        let snapshot = {
            let mut items = self.write();
            let snapshot = items.clone();
            items.retain(|item| item.product_variant_id != variant_id);
            snapshot
        };

        match self.inner.api.remove_from_cart(account_id, variant_id).await {
            Ok(()) => {
                self.publish_update();
                Ok(())
            }
            Err(e) => {
                *self.write() = snapshot;
                debug!("Removal failed, cart restored");
                Err(ClientError::from(e).reported("cart.remove"))
            }
        }
    }

    /// Ask for confirmation, then remove a line once the server agreed.
    ///
    /// `confirm` sees the line about to be removed; returning `false` cancels
    /// without any request.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, `Validation` when the line is not in the
    /// cart, the server rejection, or a transport error.
    #[instrument(skip_all, fields(variant_id = %variant_id))]
    pub async fn remove_confirmed<F>(
        &self,
        variant_id: VariantId,
        confirm: F,
    ) -> Result<RemovalOutcome>
    where
        F: FnOnce(&CartItem) -> bool,
    {
        let account_id = self.account()?;
        let item = self
            .read()
            .iter()
            .find(|item| item.product_variant_id == variant_id)
            .cloned()
            .ok_or_else(|| ClientError::Validation("This item is no longer in your cart.".to_string()))?;

        if !confirm(&item) {
            debug!("Removal cancelled by user");
            return Ok(RemovalOutcome::Cancelled);
        }

        self.inner
            .api
            .remove_from_cart(account_id, variant_id)
            .await
            .map_err(|e| ClientError::from(e).reported("cart.remove"))?;

        self.write()
            .retain(|item| item.product_variant_id != variant_id);
        self.publish_update();
        Ok(RemovalOutcome::Removed)
    }

    /// Empty the cart on the server, then locally.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, the server rejection, or a transport error;
    /// the list is untouched on failure.
    #[instrument(skip_all)]
    pub async fn clear_all(&self) -> Result<()> {
        let account_id = self.account()?;
        add_breadcrumb("cart", "Cleared cart", None);

        self.inner
            .api
            .clear_cart(account_id)
            .await
            .map_err(|e| ClientError::from(e).reported("cart.clear"))?;

        self.write().clear();
        self.publish_update();
        Ok(())
    }

    /// Add a product, then re-fetch since the server assigns the variant line.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, `Validation` for a non-positive quantity,
    /// the server rejection, or a transport error.
    #[instrument(skip_all, fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn add(&self, request: &AddToCartRequest) -> Result<()> {
        if request.quantity <= 0 {
            return Err(ClientError::Validation(
                "Quantity must be at least 1.".to_string(),
            ));
        }
        let account_id = self.account()?;
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("product_id", request.product_id.to_string().as_str())]),
        );

        self.inner
            .api
            .add_to_cart(account_id, request)
            .await
            .map_err(|e| ClientError::from(e).reported("cart.add"))?;

        self.publish_update();
        self.load().await
    }

    // =========================================================================
    // Selection (client only)
    // =========================================================================

    /// Flip a line's checkbox. Returns the new state, or `None` if the line
    /// is unknown.
    pub fn toggle_selection(&self, variant_id: VariantId) -> Option<bool> {
        let mut items = self.write();
        let item = items
            .iter_mut()
            .find(|item| item.product_variant_id == variant_id)?;
        item.is_selected = !item.is_selected;
        Some(item.is_selected)
    }

    /// Check or uncheck every line.
    pub fn set_all_selected(&self, selected: bool) {
        for item in self.write().iter_mut() {
            item.is_selected = selected;
        }
    }

    /// Checked lines.
    #[must_use]
    pub fn selected_items(&self) -> Vec<CartItem> {
        self.read()
            .iter()
            .filter(|item| item.is_selected)
            .cloned()
            .collect()
    }

    /// Variant ids of the checked lines, in cart order.
    #[must_use]
    pub fn selected_variant_ids(&self) -> Vec<VariantId> {
        self.read()
            .iter()
            .filter(|item| item.is_selected)
            .map(|item| item.product_variant_id)
            .collect()
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    /// Snapshot of every line.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.read().clone()
    }

    /// One line by variant.
    #[must_use]
    pub fn item(&self, variant_id: VariantId) -> Option<CartItem> {
        self.read()
            .iter()
            .find(|item| item.product_variant_id == variant_id)
            .cloned()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Badge count: total units across lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.read()
            .iter()
            .map(|item| i64::from(item.quantity.max(0)))
            .sum()
    }

    /// Sum of every line total.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        subtotal(self.read().iter())
    }

    /// Sum of the checked line totals.
    #[must_use]
    pub fn selected_subtotal(&self) -> Price {
        subtotal(self.read().iter().filter(|item| item.is_selected))
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<CartItem>> {
        self.inner.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<CartItem>> {
        self.inner.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CartCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartCache")
            .field("lines", &self.read().len())
            .field("epoch", &self.inner.epoch.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::bus::TabBus;
    use crate::config::ClientConfig;
    use crate::session::{SessionIdentity, SessionStore};
    use crate::storage::MemoryStore;

    fn line(variant: i64, quantity: i32, price: f64) -> serde_json::Value {
        json!({
            "productVariantId": variant,
            "productName": format!("Sản phẩm {variant}"),
            "size": "M",
            "color": "Đen",
            "quantity": quantity,
            "unitPrice": price
        })
    }

    fn envelope(data: serde_json::Value) -> serde_json::Value {
        json!({"data": data, "status": true, "message": ""})
    }

    fn cache(server: &MockServer, bus: &TabBus, signed_in: bool) -> (CartCache, Navigator) {
        let config = ClientConfig::for_base_url(Url::parse(&server.url("/api/")).unwrap());
        let session = SessionStore::new(Arc::new(MemoryStore::new()), config.session_ttl);
        if signed_in {
            session
                .sign_in(&SessionIdentity::new("tok", AccountId::new(7), "An"))
                .unwrap();
        }
        let api = ApiClient::new(&config, session).unwrap();
        let navigator = Navigator::new();
        (
            CartCache::new(api, navigator.clone(), bus.channel()),
            navigator,
        )
    }

    async fn mock_cart(server: &MockServer, lines: serde_json::Value) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cart/7");
                then.status(200).json_body(envelope(lines));
            })
            .await
    }

    #[tokio::test]
    async fn test_unauthenticated_never_calls_api() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;
        let bus = TabBus::new("shoplink");
        let (cart, navigator) = cache(&server, &bus, false);

        assert!(matches!(cart.load().await, Err(ClientError::Unauthenticated)));
        assert!(matches!(
            cart.mutate_quantity(VariantId::new(1), 1).await,
            Err(ClientError::Unauthenticated)
        ));
        assert_eq!(any.hits_async().await, 0);
        assert_eq!(navigator.current(), Navigation::login_returning_to(CART_PATH));
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_items() {
        let server = MockServer::start_async().await;
        let mut ok = mock_cart(&server, json!([line(1, 2, 100_000.0)])).await;
        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();
        ok.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/cart/7");
                then.status(500);
            })
            .await;
        let err = cart.load().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(cart.item_count(), 2);
    }

    #[tokio::test]
    async fn test_quantity_applied_only_after_confirmation() {
        let server = MockServer::start_async().await;
        mock_cart(&server, json!([line(1, 2, 100_000.0)])).await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/cart/7/change-quantity")
                    .json_body(json!({"productVariantId": 1, "quantityChange": 3}));
                then.status(200).json_body(json!({"status": true, "message": ""}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/cart/7/change-quantity")
                    .json_body(json!({"productVariantId": 1, "quantityChange": 5}));
                then.status(200)
                    .json_body(json!({"status": false, "message": "Vượt quá tồn kho"}));
            })
            .await;

        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();

        cart.mutate_quantity(VariantId::new(1), 3).await.unwrap();
        let err = cart.mutate_quantity(VariantId::new(1), 5).await.unwrap_err();
        assert_eq!(err.user_message(), "Vượt quá tồn kho");
        assert_eq!(cart.item(VariantId::new(1)).unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_load_during_quantity_change_is_not_applied_twice() {
        let server = MockServer::start_async().await;
        let mut initial = mock_cart(&server, json!([line(1, 2, 100_000.0)])).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/cart/7/change-quantity");
                then.status(200)
                    .delay(std::time::Duration::from_millis(300))
                    .json_body(json!({"status": true, "message": ""}));
            })
            .await;

        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();
        initial.delete_async().await;
        let refetch = mock_cart(&server, json!([line(1, 3, 100_000.0)])).await;

        let (changed, loaded) = tokio::join!(cart.mutate_quantity(VariantId::new(1), 1), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cart.load().await
        });
        changed.unwrap();
        loaded.unwrap();

        assert_eq!(cart.item(VariantId::new(1)).unwrap().quantity, 3);
        assert_eq!(refetch.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_overflowing_delta_refetches_instead_of_panicking() {
        let server = MockServer::start_async().await;
        let fetch = mock_cart(&server, json!([line(1, 2, 100_000.0)])).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/cart/7/change-quantity");
                then.status(200).json_body(json!({"status": true, "message": ""}));
            })
            .await;

        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();

        cart.mutate_quantity(VariantId::new(1), i32::MAX).await.unwrap();
        assert_eq!(cart.item(VariantId::new(1)).unwrap().quantity, 2);
        assert_eq!(fetch.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_optimistic_removal_rolls_back() {
        let server = MockServer::start_async().await;
        mock_cart(&server, json!([line(1, 2, 100_000.0), line(2, 1, 50_000.0)])).await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/cart/7/remove/1");
                then.status(502);
            })
            .await;

        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();
        cart.toggle_selection(VariantId::new(2));
        let before = cart.items();

        assert!(cart.remove_optimistic(VariantId::new(1)).await.is_err());
        assert_eq!(cart.items(), before);
    }

    #[tokio::test]
    async fn test_confirmed_removal() {
        let server = MockServer::start_async().await;
        mock_cart(&server, json!([line(1, 2, 100_000.0), line(2, 1, 50_000.0)])).await;
        let remove = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/cart/7/remove/2");
                then.status(200).json_body(json!({"status": true, "message": ""}));
            })
            .await;

        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();

        let outcome = cart
            .remove_confirmed(VariantId::new(2), |_| false)
            .await
            .unwrap();
        assert_eq!(outcome, RemovalOutcome::Cancelled);
        assert_eq!(remove.hits_async().await, 0);
        assert_eq!(cart.items().len(), 2);

        let outcome = cart
            .remove_confirmed(VariantId::new(2), |item| item.quantity == 1)
            .await
            .unwrap();
        assert_eq!(outcome, RemovalOutcome::Removed);
        assert_eq!(cart.items().len(), 1);
        assert!(matches!(
            cart.remove_confirmed(VariantId::new(2), |_| true).await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_all_rejected_keeps_items() {
        let server = MockServer::start_async().await;
        mock_cart(&server, json!([line(1, 2, 100_000.0)])).await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/cart/7/clear");
                then.status(200)
                    .json_body(json!({"status": false, "message": "Giỏ hàng đang bị khóa"}));
            })
            .await;

        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();
        let err = cart.clear_all().await.unwrap_err();
        assert_eq!(err.user_message(), "Giỏ hàng đang bị khóa");
        assert!(!cart.is_empty());
    }

    #[tokio::test]
    async fn test_selection_and_subtotals() {
        let server = MockServer::start_async().await;
        mock_cart(
            &server,
            json!([line(1, 2, 100_000.0), line(2, 1, 50_000.0), line(3, 4, 10_000.0)]),
        )
        .await;

        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.load().await.unwrap();
        assert_eq!(cart.item_count(), 7);
        assert_eq!(cart.subtotal(), Price::from_units(290_000));

        assert_eq!(cart.toggle_selection(VariantId::new(1)), Some(true));
        assert_eq!(cart.toggle_selection(VariantId::new(2)), Some(true));
        assert_eq!(cart.toggle_selection(VariantId::new(99)), None);
        assert_eq!(
            cart.selected_variant_ids(),
            vec![VariantId::new(1), VariantId::new(2)]
        );
        assert_eq!(cart.selected_subtotal(), Price::from_units(250_000));

        cart.load().await.unwrap();
        assert_eq!(cart.selected_items().len(), 2);

        cart.set_all_selected(false);
        assert_eq!(cart.selected_subtotal(), Price::ZERO);
    }

    #[tokio::test]
    async fn test_add_rejects_zero_quantity_locally() {
        let server = MockServer::start_async().await;
        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        let request = AddToCartRequest {
            product_id: shoplink_core::ProductId::new(1),
            size: "M".to_string(),
            color: "Đen".to_string(),
            quantity: 0,
            price: Price::from_units(1),
        };
        assert!(matches!(
            cart.add(&request).await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_signal_clears_and_redirects() {
        let server = MockServer::start_async().await;
        mock_cart(&server, json!([line(1, 2, 100_000.0)])).await;
        let bus = TabBus::new("shoplink");
        let (cart, navigator) = cache(&server, &bus, true);
        cart.attach();
        cart.load().await.unwrap();

        let mut view = navigator.watch();
        bus.channel().publish(TabSignal::Logout);
        view.wait_for(|v| matches!(v, Navigation::Login { .. }))
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_detached_cache_ignores_signals() {
        let server = MockServer::start_async().await;
        let fetch = mock_cart(&server, json!([])).await;
        let bus = TabBus::new("shoplink");
        let (cart, _) = cache(&server, &bus, true);
        cart.attach();
        cart.detach();

        bus.channel().publish(TabSignal::CartUpdated);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(fetch.hits_async().await, 0);
    }
}
