//! Notification state for one browsing context.
//!
//! Two views over one stream:
//!
//! - the **persistent** list, seeded once from the history endpoint and
//!   prepended by every push, kept for the life of the session;
//! - the **transient** list of toasts, push only, where each entry is evicted
//!   a fixed time after it arrived.
//!
//! History and push may race: a notification pushed while the history request
//! is in flight can show up twice. No deduplication is attempted because the
//! two sources share no identifier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shoplink_core::{AccountId, NotificationEntry, TabSignal};

use crate::api::ApiClient;
use crate::bus::TabChannel;
use crate::error::ClientError;
use crate::navigation::{Navigation, Navigator};
use crate::push::{ConnectionState, PushChannel};

/// Hub event carrying `(title, message)`.
pub const RECEIVE_NOTIFICATION: &str = "ReceiveNotification";

/// Hub method taking `(userId, title, message)`.
pub const SEND_NOTIFICATION: &str = "SendNotification";

/// Toasts shown at once.
pub const VISIBLE_TOASTS: usize = 3;

/// Persistent and transient notification lists.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    channel: PushChannel,
    navigator: Navigator,
    tab: TabChannel,
    toast_ttl: Duration,
    lists: RwLock<Lists>,
    evictions: Mutex<CancellationToken>,
    /// Bumped on stop and logout; history fetched under an older epoch is
    /// discarded.
    epoch: AtomicU64,
}

#[derive(Default)]
struct Lists {
    persistent: Vec<NotificationEntry>,
    transient: Vec<NotificationEntry>,
}

impl NotificationCenter {
    /// Create an empty, idle store.
    #[must_use]
    pub fn new(
        api: ApiClient,
        channel: PushChannel,
        navigator: Navigator,
        tab: TabChannel,
        toast_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                channel,
                navigator,
                tab,
                toast_ttl,
                lists: RwLock::new(Lists::default()),
                evictions: Mutex::new(CancellationToken::new()),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Listen for pushes and logout, connect, then load the history.
    ///
    /// Does nothing for an anonymous session. A failed history fetch is
    /// logged and leaves the lists as they are.
    #[instrument(skip_all)]
    pub async fn start(&self) {
        let Some(account_id) = self.inner.api.session().account_id() else {
            debug!("Anonymous session, notifications not started");
            return;
        };
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        self.listen_for_logout();

        let weak = Arc::downgrade(&self.inner);
        self.inner.channel.on_event(RECEIVE_NOTIFICATION, move |args| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.receive_push(args);
            }
        });
        self.inner.channel.start().await;

        self.load_history(account_id, epoch).await;
    }

    /// Stop the channel, cancel pending evictions and detach from the bus.
    pub async fn stop(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.tab.unsubscribe();
        self.cancel_evictions();
        self.inner.channel.stop().await;
    }

    async fn load_history(&self, account_id: AccountId, epoch: u64) {
        match self.inner.api.notification_history(account_id).await {
            Ok(_) if self.inner.epoch.load(Ordering::SeqCst) != epoch => {
                debug!(%account_id, "Discarding history fetched before logout or stop");
            }
            Ok(items) => {
                let count = items.len();
                let mut lists = self.write();
                lists
                    .persistent
                    .extend(items.into_iter().map(NotificationEntry::from));
                info!(%account_id, count, "Loaded notification history");
            }
            Err(e) => ClientError::from(e).report("notifications.history"),
        }
    }

    fn listen_for_logout(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.tab.subscribe(move |signal| {
            let weak = weak.clone();
            async move {
                if signal != TabSignal::Logout {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.handle_logout().await;
                }
            }
        });
    }

    /// Reset to the anonymous state and send the user to login.
    pub async fn handle_logout(&self) {
        info!("Logout received, clearing notifications");
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel_evictions();
        {
            let mut lists = self.write();
            lists.persistent.clear();
            lists.transient.clear();
        }
        self.inner.channel.stop().await;
        self.inner.navigator.go(Navigation::Login { return_to: None });
    }

    fn receive_push(&self, args: &[Value]) {
        let text = |i: usize| {
            args.get(i)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        if args.len() < 2 {
            warn!(count = args.len(), "Notification push with missing arguments");
        }
        self.receive(text(0), text(1));
    }

    /// Record a notification that just arrived.
    ///
    /// Prepends it to both lists and schedules removal of the toast copy.
    /// Must be called within a Tokio runtime.
    pub fn receive(&self, title: impl Into<String>, message: impl Into<String>) {
        let entry = NotificationEntry::received(title, message);
        let id = entry.id;
        {
            let mut lists = self.write();
            lists.persistent.insert(0, entry.clone());
            lists.transient.insert(0, entry);
        }
        debug!(%id, "Notification received");
        self.schedule_eviction(id);
    }

    fn schedule_eviction(&self, id: Uuid) {
        let cancel = self
            .inner
            .evictions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let weak = Arc::downgrade(&self.inner);
        let ttl = self.inner.toast_ttl;
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(ttl) => {
                    if let Some(inner) = weak.upgrade() {
                        Self { inner }.dismiss_toast(id);
                    }
                }
            }
        });
    }

    fn cancel_evictions(&self) {
        let previous = std::mem::replace(
            &mut *self
                .inner
                .evictions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        previous.cancel();
    }

    /// Badge count: the persistent list length.
    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.read().persistent.len()
    }

    /// Every notification of the session, newest pushes first.
    #[must_use]
    pub fn persistent_notifications(&self) -> Vec<NotificationEntry> {
        self.read().persistent.clone()
    }

    /// Toast copies that have not been evicted yet, newest first.
    #[must_use]
    pub fn transient_notifications(&self) -> Vec<NotificationEntry> {
        self.read().transient.clone()
    }

    /// Replace the toast list, e.g. after a widget dismissed some.
    pub fn set_transient_notifications(&self, entries: Vec<NotificationEntry>) {
        self.write().transient = entries;
    }

    /// The toasts to display right now.
    #[must_use]
    pub fn visible_toasts(&self) -> Vec<NotificationEntry> {
        self.read()
            .transient
            .iter()
            .take(VISIBLE_TOASTS)
            .cloned()
            .collect()
    }

    /// Remove one toast. Returns whether it was present.
    pub fn dismiss_toast(&self, id: Uuid) -> bool {
        let mut lists = self.write();
        let before = lists.transient.len();
        lists.transient.retain(|entry| entry.id != id);
        before != lists.transient.len()
    }

    /// Ask the hub to notify another user.
    ///
    /// Returns `false` when the channel is not connected.
    pub fn send_notification(&self, user_id: AccountId, title: &str, message: &str) -> bool {
        self.inner.channel.invoke(
            SEND_NOTIFICATION,
            vec![json!(user_id), json!(title), json!(message)],
        )
    }

    /// State of the notification channel.
    #[must_use]
    pub fn channel_state(&self) -> ConnectionState {
        self.inner.channel.state()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Lists> {
        self.inner.lists.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Lists> {
        self.inner.lists.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lists = self.read();
        f.debug_struct("NotificationCenter")
            .field("persistent", &lists.persistent.len())
            .field("transient", &lists.transient.len())
            .field("channel", &self.inner.channel)
            .finish_non_exhaustive()
    }
}
