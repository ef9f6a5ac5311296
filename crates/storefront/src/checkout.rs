//! Checkout flow.
//!
//! A checkout session is opened against the selected cart lines, kept in
//! local storage until an order consumes it, and deleted afterwards. Placing
//! an order either ends on the confirmation view or hands the user to the
//! payment provider.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use shoplink_core::{AddressId, PaymentMethod, StoreId, TabSignal, VariantId};

use crate::api::{ApiClient, CheckoutSession, PlaceOrderRequest, PlaceOrderResponse};
use crate::bus::TabChannel;
use crate::cart::CartCache;
use crate::error::{ClientError, Result, add_breadcrumb};
use crate::navigation::{Navigation, Navigator};
use crate::storage::{KeyValueStore, load_json, save_json};

/// Storage key of the in-progress checkout session.
pub const CHECKOUT_SESSION_KEY: &str = "checkoutSession";

const CHECKOUT_PATH: &str = "/checkout";

/// What the user picked on the checkout view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlacement {
    pub payment_method: PaymentMethod,
    /// Falls back to the session's default (or first) address.
    pub shipping_address_id: Option<AddressId>,
    pub store_id: Option<StoreId>,
}

impl OrderPlacement {
    #[must_use]
    pub const fn new(payment_method: PaymentMethod) -> Self {
        Self {
            payment_method,
            shipping_address_id: None,
            store_id: None,
        }
    }
}

/// Drives one browsing context through checkout.
#[derive(Clone)]
pub struct CheckoutFlow {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    navigator: Navigator,
    storage: Arc<dyn KeyValueStore>,
    tab: TabChannel,
}

impl CheckoutFlow {
    #[must_use]
    pub fn new(
        api: ApiClient,
        navigator: Navigator,
        storage: Arc<dyn KeyValueStore>,
        tab: TabChannel,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                navigator,
                storage,
                tab,
            }),
        }
    }

    /// Follow `logout` signals from other contexts.
    pub fn attach(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.tab.subscribe(move |signal| {
            let weak = weak.clone();
            async move {
                if signal == TabSignal::Logout
                    && let Some(inner) = weak.upgrade()
                {
                    Self { inner }.handle_logout();
                }
            }
        });
    }

    pub fn detach(&self) {
        self.inner.tab.unsubscribe();
    }

    /// Drop any stored session and send the user to login.
    pub fn handle_logout(&self) {
        if let Err(e) = self.inner.storage.remove(CHECKOUT_SESSION_KEY) {
            warn!(error = %e, "Failed to clear checkout session on logout");
        }
        info!("Logout received, checkout session cleared");
        self.inner.navigator.go(Navigation::Login { return_to: None });
    }

    /// Open a checkout session for the given cart lines and store it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty selection, `Unauthenticated` when
    /// signed out, or the API/storage failure.
    #[instrument(skip_all, fields(lines = variant_ids.len()))]
    pub async fn begin(&self, variant_ids: &[VariantId]) -> Result<CheckoutSession> {
        if variant_ids.is_empty() {
            return Err(ClientError::Validation(
                "Please select at least one item to check out.".to_string(),
            ));
        }
        let identity = self
            .inner
            .api
            .session()
            .require(&self.inner.navigator, CHECKOUT_PATH)?;
        add_breadcrumb("checkout", "Started checkout", None);

        let session = self
            .inner
            .api
            .create_checkout(identity.account_id, variant_ids)
            .await
            .map_err(|e| ClientError::from(e).reported("checkout.begin"))?;

        save_json(self.inner.storage.as_ref(), CHECKOUT_SESSION_KEY, &session)?;
        debug!(session = %session.check_out_session_id, "Checkout session stored");
        Ok(session)
    }

    /// [`begin`](Self::begin) with the cart's checked lines.
    ///
    /// # Errors
    ///
    /// See [`begin`](Self::begin).
    pub async fn begin_from_cart(&self, cart: &CartCache) -> Result<CheckoutSession> {
        self.begin(&cart.selected_variant_ids()).await
    }

    /// The stored session, if one is in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or holds invalid JSON.
    pub fn current(&self) -> Result<Option<CheckoutSession>> {
        Ok(load_json(self.inner.storage.as_ref(), CHECKOUT_SESSION_KEY)?)
    }

    /// Place the order for the stored session.
    ///
    /// Without any shipping address the user is sent to the add-address view.
    /// On success the session is consumed, siblings are told the cart changed,
    /// and the navigator moves to the payment page or the confirmation view.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveSession`, `AddressRequired`, `Validation` for an
    /// address outside the session, `Unauthenticated`, or the API failure.
    /// The stored session is kept on every failure.
    #[instrument(skip_all, fields(payment_method = %placement.payment_method))]
    pub async fn place_order(&self, placement: &OrderPlacement) -> Result<PlaceOrderResponse> {
        let session = self
            .current()?
            .ok_or(ClientError::NoActiveSession("checkout"))?;

        if session.shipping_addresses.is_empty() {
            self.inner.navigator.go(Navigation::AddShippingAddress);
            return Err(ClientError::AddressRequired);
        }
        let shipping_address_id = match placement.shipping_address_id {
            Some(id) if session.shipping_addresses.iter().any(|a| a.address_id == id) => id,
            Some(_) => {
                return Err(ClientError::Validation(
                    "Please choose one of your shipping addresses.".to_string(),
                ));
            }
            None => session
                .default_address()
                .map(|a| a.address_id)
                .ok_or(ClientError::AddressRequired)?,
        };

        let identity = self
            .inner
            .api
            .session()
            .require(&self.inner.navigator, CHECKOUT_PATH)?;
        add_breadcrumb(
            "checkout",
            "Placed order",
            Some(&[("payment_method", placement.payment_method.as_str())]),
        );

        let request = PlaceOrderRequest {
            account_id: identity.account_id,
            check_out_session_id: session.check_out_session_id,
            shipping_address_id,
            payment_method: placement.payment_method,
            store_id: placement.store_id,
        };
        let response = self
            .inner
            .api
            .place_order(&request)
            .await
            .map_err(|e| ClientError::from(e).reported("checkout.place_order"))?;

        if let Err(e) = self.inner.storage.remove(CHECKOUT_SESSION_KEY) {
            warn!(error = %e, "Order placed but checkout session could not be cleared");
        }
        self.inner.tab.publish(TabSignal::CartUpdated);
        info!(order_id = ?response.order_id, "Order placed");

        self.inner.navigator.go(destination(placement.payment_method, &response));
        Ok(response)
    }

    /// Forget the stored session without placing an order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn abandon(&self) -> Result<()> {
        self.inner.storage.remove(CHECKOUT_SESSION_KEY)?;
        Ok(())
    }
}

/// Where the user goes after a successful order.
fn destination(method: PaymentMethod, response: &PlaceOrderResponse) -> Navigation {
    if method.is_redirect()
        && let Some(raw) = response.payment_url.as_deref()
    {
        match Url::parse(raw) {
            Ok(url) => return Navigation::External(url),
            Err(e) => warn!(error = %e, "Ignoring malformed payment URL"),
        }
    }
    Navigation::OrderConfirmation {
        order_id: response.order_id,
    }
}

impl std::fmt::Debug for CheckoutFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutFlow").finish_non_exhaustive()
    }
}
