//! Per-context storefront state.
//!
//! A [`Storefront`] is one browsing context: it owns the session, the API
//! client, the navigator and an endpoint on the shared cross-tab bus, and it
//! builds the components that live in that context. Two contexts that share a
//! [`TabBus`] and a storage backend behave like two tabs of one site.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::account::AccountService;
use crate::api::{ApiClient, ApiError};
use crate::bus::{TabBus, TabChannel};
use crate::cart::CartCache;
use crate::chat::BotChat;
use crate::checkout::{CHECKOUT_SESSION_KEY, CheckoutFlow};
use crate::config::ClientConfig;
use crate::navigation::{Navigation, Navigator};
use crate::notifications::NotificationCenter;
use crate::push::{PushChannel, PushTransport, WebSocketTransport};
use crate::returns::{RETURN_SESSION_KEY, ReturnFlow};
use crate::session::{SessionIdentity, SessionStore};
use crate::storage::{DirectoryStore, KeyValueStore, MemoryStore, StorageError};
use shoplink_core::TabSignal;

/// Error building a [`Storefront`].
#[derive(Debug, Error)]
pub enum StateError {
    #[error("HTTP client error: {0}")]
    Api(#[from] ApiError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// One browsing context.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: ClientConfig,
    storage: Arc<dyn KeyValueStore>,
    session: SessionStore,
    api: ApiClient,
    navigator: Navigator,
    bus: TabBus,
    tab: TabChannel,
    transport: Arc<dyn PushTransport>,
}

impl Storefront {
    /// Create a context from configuration.
    ///
    /// Uses directory storage when `state_dir` is set, memory otherwise, a
    /// fresh bus named after `tab_channel`, and the WebSocket push transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be created or the HTTP
    /// client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, StateError> {
        let storage: Arc<dyn KeyValueStore> = match &config.state_dir {
            Some(dir) => Arc::new(DirectoryStore::open(dir)?),
            None => Arc::new(MemoryStore::new()),
        };
        let bus = TabBus::new(config.tab_channel.clone());
        Self::with_parts(config, storage, bus, Arc::new(WebSocketTransport))
    }

    /// Create a context from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_parts(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        bus: TabBus,
        transport: Arc<dyn PushTransport>,
    ) -> Result<Self, StateError> {
        let session = SessionStore::new(Arc::clone(&storage), config.session_ttl);
        let api = ApiClient::new(&config, session.clone())?;
        let tab = bus.channel();

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                storage,
                session,
                api,
                navigator: Navigator::new(),
                bus,
                tab,
                transport,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.inner.navigator
    }

    #[must_use]
    pub fn bus(&self) -> &TabBus {
        &self.inner.bus
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.storage
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// A cart cache following bus signals.
    #[must_use]
    pub fn cart(&self) -> CartCache {
        let cart = CartCache::new(
            self.inner.api.clone(),
            self.inner.navigator.clone(),
            self.inner.bus.channel(),
        );
        cart.attach();
        cart
    }

    /// A checkout flow following logout signals.
    #[must_use]
    pub fn checkout(&self) -> CheckoutFlow {
        let flow = CheckoutFlow::new(
            self.inner.api.clone(),
            self.inner.navigator.clone(),
            Arc::clone(&self.inner.storage),
            self.inner.bus.channel(),
        );
        flow.attach();
        flow
    }

    #[must_use]
    pub fn returns(&self) -> ReturnFlow {
        ReturnFlow::new(
            self.inner.api.clone(),
            self.inner.navigator.clone(),
            Arc::clone(&self.inner.storage),
        )
    }

    #[must_use]
    pub fn account(&self) -> AccountService {
        AccountService::new(self.inner.api.clone(), self.inner.navigator.clone())
    }

    /// An idle notification center on its own push channel.
    #[must_use]
    pub fn notifications(&self) -> NotificationCenter {
        NotificationCenter::new(
            self.inner.api.clone(),
            self.push_channel("notifications", self.inner.config.notification_hub_url.clone()),
            self.inner.navigator.clone(),
            self.inner.bus.channel(),
            self.inner.config.toast_ttl,
        )
    }

    /// An idle assistant chat on its own push channel.
    #[must_use]
    pub fn chat(&self) -> BotChat {
        BotChat::new(
            self.push_channel("chat", self.inner.config.chat_hub_url.clone()),
            self.inner.session.clone(),
            self.inner.navigator.clone(),
        )
    }

    fn push_channel(&self, name: &str, endpoint: url::Url) -> PushChannel {
        PushChannel::new(
            name,
            endpoint,
            Arc::clone(&self.inner.transport),
            self.inner.session.clone(),
            self.inner.config.reconnect_delay,
        )
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Store a new identity after a successful login.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub fn sign_in(&self, identity: &SessionIdentity) -> Result<(), StorageError> {
        self.inner.session.sign_in(identity)
    }

    /// Sign out and tell every component, here and in other contexts.
    ///
    /// Stored checkout and return sessions are dropped with the identity.
    /// Components built by this context hold their own bus endpoints, so they
    /// receive the `logout` signal like any other context does.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be cleared; nothing is
    /// published in that case.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.inner.session.sign_out()?;
        for key in [CHECKOUT_SESSION_KEY, RETURN_SESSION_KEY] {
            self.inner.storage.remove(key)?;
        }
        self.inner.tab.publish(TabSignal::Logout);
        self.inner.navigator.go(Navigation::Login { return_to: None });
        info!("Logout published");
        Ok(())
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api_base_url", &self.inner.config.api_base_url.as_str())
            .field("bus", &self.inner.bus.name())
            .field("authenticated", &self.inner.session.is_authenticated())
            .finish_non_exhaustive()
    }
}
