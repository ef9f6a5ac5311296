//! End-to-end tests for the ShopLink storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shoplink-integration-tests
//! ```
//!
//! Every test runs against an in-process `httpmock` server standing in for
//! the REST backend; the WebSocket tests start a local hub. No external
//! services are needed.
//!
//! # Test Categories
//!
//! - `cart_sync` - confirmation, rollback and cross-context propagation
//! - `checkout_flow` - checkout session through order placement
//! - `logout` - logout fan-out across contexts
//! - `notifications` - toast eviction timing
//! - `websocket_hub` - push channel over a real socket

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use serde_json::{Value, json};
use url::Url;

use shoplink_core::AccountId;
use shoplink_storefront::Storefront;
use shoplink_storefront::bus::TabBus;
use shoplink_storefront::config::ClientConfig;
use shoplink_storefront::push::WebSocketTransport;
use shoplink_storefront::session::SessionIdentity;
use shoplink_storefront::storage::{KeyValueStore, MemoryStore};

/// Account every scenario signs in as.
pub const ACCOUNT: i64 = 7;

/// A mock backend plus the storage and bus shared by every context, the way
/// tabs of one site share cookies and a broadcast channel.
pub struct Site {
    pub server: MockServer,
    pub storage: Arc<dyn KeyValueStore>,
    pub bus: TabBus,
}

impl Site {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start_async().await,
            storage: Arc::new(MemoryStore::new()),
            bus: TabBus::new("shoplink"),
        }
    }

    /// Configuration pointing at the mock backend.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let base = Url::parse(&self.server.url("/api/")).expect("mock server URL");
        ClientConfig {
            reconnect_delay: Duration::from_millis(200),
            ..ClientConfig::for_base_url(base)
        }
    }

    /// Open another browsing context ("tab").
    #[must_use]
    pub fn tab(&self) -> Storefront {
        self.tab_with(self.config())
    }

    /// Open a context with custom configuration on the shared storage and bus.
    #[must_use]
    pub fn tab_with(&self, config: ClientConfig) -> Storefront {
        Storefront::with_parts(
            config,
            Arc::clone(&self.storage),
            self.bus.clone(),
            Arc::new(WebSocketTransport),
        )
        .expect("storefront context")
    }

    /// Open a context and sign in as [`ACCOUNT`].
    #[must_use]
    pub fn signed_in_tab(&self) -> Storefront {
        sign_in(self.tab())
    }
}

/// Sign `tab` in as [`ACCOUNT`] with token `tok-7`.
#[must_use]
pub fn sign_in(tab: Storefront) -> Storefront {
    tab.sign_in(&SessionIdentity::new("tok-7", AccountId::new(ACCOUNT), "An"))
        .expect("sign in");
    tab
}

/// A backend cart line.
#[must_use]
pub fn cart_line(variant: i64, quantity: i32, price: f64) -> Value {
    json!({
        "productVariantId": variant,
        "productName": format!("Sản phẩm {variant}"),
        "size": "M",
        "color": "Đen",
        "quantity": quantity,
        "unitPrice": price
    })
}

/// Successful envelope around `data`.
#[must_use]
pub fn ok(data: Value) -> Value {
    json!({"data": data, "status": true, "message": ""})
}

/// Successful envelope without data.
#[must_use]
pub fn ok_empty() -> Value {
    json!({"status": true, "message": ""})
}

/// Rejection envelope.
#[must_use]
pub fn rejected(message: &str) -> Value {
    json!({"status": false, "message": message})
}

/// Poll `condition` until it holds, failing after five seconds.
pub async fn eventually<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}
