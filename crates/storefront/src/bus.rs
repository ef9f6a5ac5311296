//! Cross-tab event bus.
//!
//! A [`TabBus`] plays the role of a named broadcast channel scoped to one
//! site: every browsing context (tab) of the process holds endpoints on the
//! same bus. An endpoint ([`TabChannel`]) publishes to every *other* endpoint
//! and runs at most one async handler for what it receives.
//!
//! Delivery is best effort. There is no acknowledgment and no ordering
//! between endpoints; a slow handler that falls behind skips the signals it
//! missed, which is harmless because every signal means "re-read state".

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use shoplink_core::TabSignal;

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Delivery {
    origin: u64,
    signal: TabSignal,
}

/// A named, site-wide signal channel.
///
/// Cheaply cloneable; clones share the same channel.
#[derive(Clone)]
pub struct TabBus {
    inner: Arc<TabBusInner>,
}

struct TabBusInner {
    name: String,
    tx: Option<broadcast::Sender<Delivery>>,
    next_endpoint: AtomicU64,
}

impl TabBus {
    /// Create a working bus.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self::build(name.into(), Some(tx))
    }

    /// A bus that accepts every call and delivers nothing.
    ///
    /// Used where cross-context delivery is not supported.
    #[must_use]
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    fn build(name: String, tx: Option<broadcast::Sender<Delivery>>) -> Self {
        Self {
            inner: Arc::new(TabBusInner {
                name,
                tx,
                next_endpoint: AtomicU64::new(1),
            }),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether signals are actually delivered.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.inner.tx.is_some()
    }

    /// Open a new endpoint on the bus.
    #[must_use]
    pub fn channel(&self) -> TabChannel {
        let id = self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed);
        TabChannel {
            id,
            bus: self.clone(),
            handler: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for TabBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabBus")
            .field("name", &self.inner.name)
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

/// One context's endpoint on a [`TabBus`].
///
/// Dropping the endpoint detaches its handler.
pub struct TabChannel {
    id: u64,
    bus: TabBus,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl TabChannel {
    /// Send a signal to every other endpoint. Never fails.
    pub fn publish(&self, signal: TabSignal) {
        let Some(tx) = &self.bus.inner.tx else {
            return;
        };
        let delivery = Delivery {
            origin: self.id,
            signal,
        };
        match tx.send(delivery) {
            Ok(receivers) => {
                debug!(channel = %self.bus.name(), %signal, receivers, "Published tab signal");
            }
            Err(_) => debug!(channel = %self.bus.name(), %signal, "No tab listeners"),
        }
    }

    /// Install the handler for signals from other endpoints.
    ///
    /// Replaces (and stops) any previously installed handler, so calling this
    /// repeatedly never produces duplicate deliveries. Must be called from
    /// within a Tokio runtime to have any effect; outside one it is a no-op.
    pub fn subscribe<F, Fut>(&self, handler: F)
    where
        F: Fn(TabSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.unsubscribe();

        let Some(tx) = &self.bus.inner.tx else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(channel = %self.bus.name(), "No async runtime, tab signals disabled");
            return;
        };

        let mut rx = tx.subscribe();
        let own_id = self.id;
        let name = self.bus.name().to_string();
        let task = runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(delivery) if delivery.origin == own_id => {}
                    Ok(delivery) => handler(delivery.signal).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %name, skipped, "Tab listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Remove the handler, if any.
    pub fn unsubscribe(&self) {
        if let Some(task) = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    /// Whether a handler is installed.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TabChannel {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
