//! Observable "current view" for one browsing context.
//!
//! Flows express redirects (login, order confirmation, external payment)
//! by moving the navigator; a front end watches it and renders accordingly.

use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

use shoplink_core::OrderId;

/// A view the storefront can be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Home,
    Cart,
    Checkout,
    /// Login view, remembering where the user was headed.
    Login { return_to: Option<String> },
    /// Checkout cannot continue until an address exists.
    AddShippingAddress,
    OrderConfirmation { order_id: Option<OrderId> },
    ReturnConfirmation,
    /// Leave the storefront entirely (payment provider page).
    External(Url),
}

impl Navigation {
    /// Login view returning to `path` afterwards.
    #[must_use]
    pub fn login_returning_to(path: &str) -> Self {
        Self::Login {
            return_to: Some(path.to_string()),
        }
    }
}

/// Cheaply cloneable handle to a context's current view.
#[derive(Debug, Clone)]
pub struct Navigator {
    tx: Arc<watch::Sender<Navigation>>,
}

impl Navigator {
    /// Start at the home view.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Navigation::Home);
        Self { tx: Arc::new(tx) }
    }

    /// Move to a view.
    pub fn go(&self, to: Navigation) {
        tracing::debug!(?to, "navigate");
        self.tx.send_replace(to);
    }

    /// The view currently shown.
    #[must_use]
    pub fn current(&self) -> Navigation {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every navigation.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Navigation> {
        self.tx.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}
