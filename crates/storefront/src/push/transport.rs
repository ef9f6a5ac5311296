//! WebSocket hub transport.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, instrument, warn};
use url::Url;

use super::protocol::{HubMessage, handshake_request, parse_handshake_response};
use super::{PushError, PushLink, PushTransport};

/// Interval between client keep-alive pings.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// How long the hub gets to answer the handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

const LINK_BUFFER: usize = 64;

/// Connects to a SignalR-style hub over WebSocket with the JSON protocol.
///
/// `http`/`https` endpoints are rewritten to `ws`/`wss`. The session token is
/// passed as the `access_token` query parameter, the way browser clients
/// authenticate hub connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Build the WebSocket URL for an endpoint.
    ///
    /// # Errors
    ///
    /// Returns `PushError::InvalidEndpoint` for unsupported schemes.
    pub fn socket_url(endpoint: &Url, token: Option<&SecretString>) -> Result<Url, PushError> {
        let mut url = endpoint.clone();
        let scheme = match endpoint.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(PushError::InvalidEndpoint(format!(
                    "unsupported scheme {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| PushError::InvalidEndpoint(endpoint.to_string()))?;
        if let Some(token) = token {
            url.query_pairs_mut()
                .append_pair("access_token", token.expose_secret());
        }
        Ok(url)
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    async fn connect(
        &self,
        endpoint: &Url,
        token: Option<&SecretString>,
    ) -> Result<PushLink, PushError> {
        let url = Self::socket_url(endpoint, token)?;
        let (socket, _) = connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        sink.send(Message::Text(handshake_request())).await?;

        let pending = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(frame) = stream.next().await {
                match frame? {
                    Message::Text(text) => {
                        return parse_handshake_response(&text).map(HubMessage::parse_frames);
                    }
                    Message::Close(frame) => {
                        return Err(PushError::Closed(format!("{frame:?}")));
                    }
                    _ => {}
                }
            }
            Err(PushError::Closed("stream ended during handshake".to_string()))
        })
        .await
        .map_err(|_| PushError::Handshake("timed out".to_string()))??;
        debug!("Hub handshake complete");

        let (outbound, mut outgoing) = mpsc::channel::<HubMessage>(LINK_BUFFER);
        let (incoming, inbound) = mpsc::channel::<HubMessage>(LINK_BUFFER);

        for message in pending {
            // Fresh channel with capacity to spare
            let _ = incoming.try_send(message);
        }

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + KEEP_ALIVE_INTERVAL;
            let mut keep_alive = tokio::time::interval_at(start, KEEP_ALIVE_INTERVAL);

            'bridge: loop {
                tokio::select! {
                    message = outgoing.recv() => {
                        let Some(message) = message else {
                            let _ = sink.close().await;
                            break;
                        };
                        let closing = matches!(message, HubMessage::Close { .. });
                        if let Err(e) = sink.send(Message::Text(message.to_frame())).await {
                            warn!(error = %e, "Hub send failed");
                            break;
                        }
                        if closing {
                            let _ = sink.close().await;
                            break;
                        }
                    }
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            for message in HubMessage::parse_frames(&text) {
                                if incoming.send(message).await.is_err() {
                                    break 'bridge;
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "Hub sent close frame");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "Hub connection error");
                            break;
                        }
                        None => break,
                    },
                    _ = keep_alive.tick() => {
                        if let Err(e) = sink.send(Message::Text(HubMessage::Ping.to_frame())).await {
                            warn!(error = %e, "Hub keep-alive failed");
                            break;
                        }
                    }
                }
            }
            debug!("Hub bridge exited");
        });

        Ok(PushLink { outbound, inbound })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url_rewrites_scheme_and_adds_token() {
        let endpoint = Url::parse("https://api.shop.test/notificationHub").unwrap();
        let token = SecretString::from("abc 123".to_string());
        let url = WebSocketTransport::socket_url(&endpoint, Some(&token)).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.shop.test/notificationHub?access_token=abc+123"
        );

        let plain = Url::parse("http://localhost:5000/chatHub").unwrap();
        assert_eq!(
            WebSocketTransport::socket_url(&plain, None).unwrap().as_str(),
            "ws://localhost:5000/chatHub"
        );
    }

    #[test]
    fn test_socket_url_rejects_other_schemes() {
        let endpoint = Url::parse("ftp://files.test/hub").unwrap();
        assert!(matches!(
            WebSocketTransport::socket_url(&endpoint, None),
            Err(PushError::InvalidEndpoint(_))
        ));
    }
}
