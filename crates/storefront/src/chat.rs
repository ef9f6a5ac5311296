//! Shopping assistant chat over its own push channel.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, Result};
use crate::navigation::Navigator;
use crate::push::{ConnectionHandle, ConnectionState, PushChannel};
use crate::session::SessionStore;

/// Hub event carrying `(sender, message)`.
pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";

/// Hub method taking `(userId, content)`.
pub const SEND_MESSAGE: &str = "SendMessage";

const CHAT_PATH: &str = "/chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub direction: Direction,
    pub sender: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Conversation log fed by the chat hub.
///
/// Cheaply cloneable; clones share the log.
#[derive(Clone)]
pub struct BotChat {
    inner: Arc<Inner>,
}

struct Inner {
    channel: PushChannel,
    session: SessionStore,
    navigator: Navigator,
    log: RwLock<Vec<ChatMessage>>,
}

impl BotChat {
    #[must_use]
    pub fn new(channel: PushChannel, session: SessionStore, navigator: Navigator) -> Self {
        Self {
            inner: Arc::new(Inner {
                channel,
                session,
                navigator,
                log: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register the reply handler and connect.
    pub async fn start(&self) -> ConnectionHandle {
        let weak = Arc::downgrade(&self.inner);
        self.inner.channel.on_event(RECEIVE_MESSAGE, move |args| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.receive(args);
            }
        });
        self.inner.channel.start().await
    }

    pub async fn stop(&self) {
        self.inner.channel.stop().await;
    }

    fn receive(&self, args: &[Value]) {
        let [sender, message, ..] = args else {
            warn!(count = args.len(), "Chat reply with missing arguments");
            return;
        };
        let text = |v: &Value| v.as_str().map_or_else(|| v.to_string(), str::to_string);
        self.push(ChatMessage {
            direction: Direction::Incoming,
            sender: text(sender),
            content: text(message),
            at: Utc::now(),
        });
    }

    /// Send a message to the assistant.
    ///
    /// Returns `Ok(false)` when the channel is not connected; the message is
    /// then neither sent nor logged.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank content, or `Unauthenticated` when
    /// signed out.
    #[instrument(skip_all, fields(len = content.len()))]
    pub fn send(&self, content: &str) -> Result<bool> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::Validation("Message cannot be empty.".to_string()));
        }
        let identity = self.inner.session.require(&self.inner.navigator, CHAT_PATH)?;

        let dispatched = self.inner.channel.invoke(
            SEND_MESSAGE,
            vec![json!(identity.account_id), json!(content)],
        );
        if dispatched {
            self.push(ChatMessage {
                direction: Direction::Outgoing,
                sender: identity.user_name,
                content: content.to_string(),
                at: Utc::now(),
            });
        } else {
            debug!("Chat message not dispatched");
        }
        Ok(dispatched)
    }

    /// The conversation so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner
            .log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn channel_state(&self) -> ConnectionState {
        self.inner.channel.state()
    }

    fn push(&self, message: ChatMessage) {
        self.inner
            .log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

impl std::fmt::Debug for BotChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotChat")
            .field("channel", &self.inner.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use url::Url;

    use super::*;
    use crate::push::HubMessage;
    use crate::push::fake::FakeTransport;
    use crate::session::SessionIdentity;
    use crate::storage::MemoryStore;
    use shoplink_core::AccountId;

    type Hubs = tokio::sync::mpsc::UnboundedReceiver<crate::push::fake::FakeHub>;

    fn chat(signed_in: bool) -> (BotChat, Arc<FakeTransport>, Hubs) {
        let session = SessionStore::new(Arc::new(MemoryStore::new()), chrono::Duration::hours(24));
        if signed_in {
            session
                .sign_in(&SessionIdentity::new("tok", AccountId::new(7), "An"))
                .unwrap();
        }
        let (transport, hubs) = FakeTransport::accepting();
        let channel = PushChannel::new(
            "chat",
            Url::parse("http://shop.test/chatHub").unwrap(),
            Arc::clone(&transport) as _,
            session.clone(),
            Duration::from_secs(5),
        );
        (BotChat::new(channel, session, Navigator::new()), transport, hubs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_are_logged_in_order() {
        let (chat, _transport, mut hubs) = chat(true);
        chat.start().await;
        let hub = hubs.recv().await.unwrap();

        hub.invoke(RECEIVE_MESSAGE, vec![json!("Bot"), json!("Xin chào!")]).await;
        hub.invoke(RECEIVE_MESSAGE, vec![json!("Bot"), json!("Bạn cần gì?")]).await;
        hub.invoke(RECEIVE_MESSAGE, vec![json!("Bot")]).await;

        while chat.messages().len() < 2 {
            tokio::task::yield_now().await;
        }
        let contents: Vec<_> = chat.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["Xin chào!", "Bạn cần gì?"]);
        chat.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_records_only_dispatched_messages() {
        let (chat, _transport, mut hubs) = chat(true);
        assert!(!chat.send("còn size M không?").unwrap());
        assert!(chat.messages().is_empty());

        chat.start().await;
        let mut hub = hubs.recv().await.unwrap();
        chat.inner
            .channel
            .watch_state()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        assert!(chat.send("còn size M không?").unwrap());
        let sent = hub.from_client.recv().await.unwrap();
        assert_eq!(
            sent,
            HubMessage::invocation(SEND_MESSAGE, vec![json!(7), json!("còn size M không?")])
        );
        let log = chat.messages();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].direction, Direction::Outgoing);
        assert_eq!(log[0].sender, "An");
        chat.stop().await;
    }

    #[tokio::test]
    async fn test_send_requires_session_and_content() {
        let (chat, _transport, _hubs) = chat(false);
        assert!(matches!(chat.send("  "), Err(ClientError::Validation(_))));
        assert!(matches!(chat.send("hi"), Err(ClientError::Unauthenticated)));
    }
}
