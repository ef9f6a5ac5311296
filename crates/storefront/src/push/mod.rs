//! Auto-reconnecting push channel client.
//!
//! One [`PushChannel`] per logical hub (notifications, chat). A channel is a
//! small supervisor: [`PushChannel::start`] spawns a loop that connects
//! through a [`PushTransport`], pumps inbound invocations to the registered
//! handlers in receipt order, and reconnects after a fixed delay whenever a
//! connection attempt fails or an established connection drops. The loop is
//! the only unbounded retry in the crate; it ends when the returned
//! [`ConnectionHandle`] is cancelled, when [`PushChannel::stop`] is called, or
//! when the last clone of the channel is dropped.
//!
//! The session token is read at every attempt, never captured at start.

mod protocol;
mod transport;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::session::SessionStore;

pub use protocol::{HubMessage, RECORD_SEPARATOR, handshake_request, parse_handshake_response};
pub use transport::WebSocketTransport;

/// Errors raised while establishing or running a hub connection.
#[derive(Debug, Error)]
pub enum PushError {
    /// The endpoint URL cannot be used for a hub connection.
    #[error("Invalid hub endpoint: {0}")]
    InvalidEndpoint(String),

    /// WebSocket connect or I/O failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The hub refused or garbled the protocol handshake.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The connection closed before it was usable.
    #[error("Connection closed: {0}")]
    Closed(String),
}

/// Lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// An established connection dropped and is being re-established.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        })
    }
}

/// Both ends of an established hub connection, as seen by the channel.
///
/// Dropping `outbound` asks the transport to close; `inbound` ending means the
/// connection is gone.
#[derive(Debug)]
pub struct PushLink {
    pub outbound: mpsc::Sender<HubMessage>,
    pub inbound: mpsc::Receiver<HubMessage>,
}

/// Opens hub connections.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Connect to `endpoint`, authenticating with `token` when present.
    ///
    /// # Errors
    ///
    /// Returns error if the connection or handshake fails.
    async fn connect(
        &self,
        endpoint: &Url,
        token: Option<&SecretString>,
    ) -> Result<PushLink, PushError>;
}

/// Cancels the connect loop it was returned from.
#[derive(Debug, Clone)]
pub struct ConnectionHandle(CancellationToken);

impl ConnectionHandle {
    /// Stop the loop, including any pending reconnect delay.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called or the channel stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

// =============================================================================
// PushChannel
// =============================================================================

/// Client for one hub.
///
/// Cheaply cloneable; clones share the connection.
#[derive(Clone)]
pub struct PushChannel {
    inner: Arc<PushChannelInner>,
}

struct PushChannelInner {
    shared: Arc<Shared>,
    run: tokio::sync::Mutex<Option<Run>>,
}

/// State the connect loop needs; never refers back to the channel.
struct Shared {
    name: String,
    endpoint: Url,
    transport: Arc<dyn PushTransport>,
    session: SessionStore,
    retry_delay: Duration,
    state: watch::Sender<ConnectionState>,
    handlers: RwLock<HashMap<String, EventHandler>>,
    outbound: Mutex<Option<mpsc::Sender<HubMessage>>>,
}

struct Run {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PushChannel {
    /// Create an idle channel.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        endpoint: Url,
        transport: Arc<dyn PushTransport>,
        session: SessionStore,
        retry_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(PushChannelInner {
                shared: Arc::new(Shared {
                    name: name.into(),
                    endpoint,
                    transport,
                    session,
                    retry_delay,
                    state,
                    handlers: RwLock::new(HashMap::new()),
                    outbound: Mutex::new(None),
                }),
                run: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Channel name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.shared.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.shared.state.borrow()
    }

    /// Receiver notified on every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    /// Register the handler for an event, replacing any previous one.
    ///
    /// Handlers run on the connect loop, one message at a time, so they must
    /// not block.
    pub fn on_event<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let event = event.into();
        let replaced = self
            .inner
            .shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.clone(), Arc::new(handler))
            .is_some();
        debug!(channel = %self.name(), %event, replaced, "Registered push handler");
    }

    /// Remove the handler for an event.
    pub fn off_event(&self, event: &str) {
        self.inner
            .shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event);
    }

    /// Stop any previous run, then start connecting in the background.
    pub async fn start(&self) -> ConnectionHandle {
        let mut run = self.inner.run.lock().await;
        if let Some(previous) = run.take() {
            shutdown(previous).await;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(connect_loop(
            Arc::clone(&self.inner.shared),
            cancel.clone(),
        ));
        *run = Some(Run {
            cancel: cancel.clone(),
            task,
        });
        info!(channel = %self.name(), endpoint = %self.inner.shared.endpoint, "Push channel started");
        ConnectionHandle(cancel)
    }

    /// Stop the connect loop and close the connection, if any.
    ///
    /// Waits until the loop has exited. A no-op when never started.
    pub async fn stop(&self) {
        let previous = self.inner.run.lock().await.take();
        if let Some(previous) = previous {
            shutdown(previous).await;
            info!(channel = %self.name(), "Push channel stopped");
        }
    }

    /// Stop, then start over with a fresh connection.
    ///
    /// Registered handlers are kept.
    pub async fn reset(&self) -> ConnectionHandle {
        self.stop().await;
        self.start().await
    }

    /// Send a fire-and-forget invocation.
    ///
    /// Returns `false`, after logging a warning, when the channel is not
    /// connected; the call is dropped, never queued.
    pub fn invoke(&self, method: &str, arguments: Vec<Value>) -> bool {
        let shared = &self.inner.shared;
        let state = *shared.state.borrow();
        let sender = shared
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(sender) = sender.filter(|_| state == ConnectionState::Connected) else {
            warn!(channel = %shared.name, method, %state, "Push channel not connected, dropping invocation");
            return false;
        };

        match sender.try_send(HubMessage::invocation(method, arguments)) {
            Ok(()) => {
                debug!(channel = %shared.name, method, "Sent push invocation");
                true
            }
            Err(e) => {
                warn!(channel = %shared.name, method, error = %e, "Dropping push invocation");
                false
            }
        }
    }
}

impl fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushChannel")
            .field("name", &self.inner.shared.name)
            .field("endpoint", &self.inner.shared.endpoint.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for PushChannelInner {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.cancel.cancel();
        }
    }
}

async fn shutdown(run: Run) {
    run.cancel.cancel();
    if let Err(e) = run.task.await
        && e.is_panic()
    {
        warn!(error = %e, "Push connect loop panicked");
    }
}

// =============================================================================
// Connect loop
// =============================================================================

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(channel = %self.name, from = %previous, to = %state, "Push channel state changed");
        }
    }

    fn set_outbound(&self, sender: Option<mpsc::Sender<HubMessage>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = sender;
    }

    fn dispatch(&self, target: &str, arguments: &[Value]) {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .cloned();
        match handler {
            Some(handler) => {
                debug!(channel = %self.name, event = target, "Received push event");
                handler(arguments);
            }
            None => debug!(channel = %self.name, event = target, "No handler for push event"),
        }
    }
}

async fn connect_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut attempt_state = ConnectionState::Connecting;

    loop {
        shared.set_state(attempt_state);
        let token = shared.session.token();

        let connected = tokio::select! {
            () = cancel.cancelled() => break,
            result = shared.transport.connect(&shared.endpoint, token.as_ref()) => result,
        };

        match connected {
            Ok(link) => {
                shared.set_outbound(Some(link.outbound.clone()));
                shared.set_state(ConnectionState::Connected);
                let stopped = pump(&shared, link, &cancel).await;
                shared.set_outbound(None);
                if stopped {
                    break;
                }
                attempt_state = ConnectionState::Reconnecting;
                shared.set_state(attempt_state);
                warn!(
                    channel = %shared.name,
                    retry_in_secs = shared.retry_delay.as_secs_f64(),
                    "Push connection lost"
                );
            }
            Err(e) => {
                warn!(
                    channel = %shared.name,
                    error = %e,
                    retry_in_secs = shared.retry_delay.as_secs_f64(),
                    "Push connect failed"
                );
            }
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(shared.retry_delay) => {}
        }
    }

    shared.set_state(ConnectionState::Disconnected);
}

/// Deliver inbound messages until the connection ends.
///
/// Returns `true` when it ended because the loop was cancelled.
async fn pump(shared: &Shared, mut link: PushLink, cancel: &CancellationToken) -> bool {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                if link.outbound.send(HubMessage::Close { error: None }).await.is_err() {
                    debug!(channel = %shared.name, "Connection already closed");
                }
                return true;
            }
            message = link.inbound.recv() => match message {
                Some(HubMessage::Invocation { target, arguments }) => {
                    shared.dispatch(&target, &arguments);
                }
                Some(HubMessage::Ping) => {}
                Some(HubMessage::Close { error }) => {
                    info!(channel = %shared.name, error = ?error, "Hub closed the connection");
                    return false;
                }
                None => return false,
            },
        }
    }
}
