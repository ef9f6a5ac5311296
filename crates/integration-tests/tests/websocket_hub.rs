//! Push channels against a local WebSocket hub.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

use shoplink_core::AccountId;
use shoplink_integration_tests::{Site, eventually, ok, sign_in};
use shoplink_storefront::Storefront;
use shoplink_storefront::config::ClientConfig;
use shoplink_storefront::push::{
    ConnectionState, HubMessage, RECORD_SEPARATOR, handshake_request,
};

type HubSocket = WebSocketStream<TcpStream>;

async fn within<T>(what: &str, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

/// Accept one hub connection and complete the protocol handshake.
///
/// Returns the socket and the query string of the upgrade request.
async fn accept_hub(listener: &TcpListener) -> (HubSocket, Option<String>) {
    let (stream, _) = within("hub connection", listener.accept()).await.unwrap();
    let mut query = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        query = request.uri().query().map(str::to_string);
        Ok(response)
    };
    let mut socket = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .unwrap();

    let opening = within("handshake", next_text(&mut socket)).await;
    assert_eq!(opening, handshake_request());
    socket
        .send(Message::Text(format!("{{}}{RECORD_SEPARATOR}")))
        .await
        .unwrap();
    (socket, query)
}

async fn next_text(socket: &mut HubSocket) -> String {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return text,
            Some(Ok(_)) => {}
            other => panic!("hub socket ended: {other:?}"),
        }
    }
}

async fn hub_tab(site: &Site, listener: &TcpListener) -> Storefront {
    let hub = Url::parse(&format!("http://{}/hub", listener.local_addr().unwrap())).unwrap();
    site.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/notifications/user/7");
            then.status(200).json_body(ok(json!([])));
        })
        .await;
    sign_in(site.tab_with(ClientConfig {
        notification_hub_url: hub.clone(),
        chat_hub_url: hub,
        ..site.config()
    }))
}

#[tokio::test]
async fn notifications_flow_both_ways_and_survive_a_dropped_connection() {
    let site = Site::start().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tab = hub_tab(&site, &listener).await;

    let center = tab.notifications();
    center.start().await;
    let (mut socket, query) = accept_hub(&listener).await;
    assert_eq!(query.as_deref(), Some("access_token=tok-7"));

    socket
        .send(Message::Text(
            HubMessage::invocation("ReceiveNotification", vec![json!("Đơn hàng #3"), json!("Đang giao")])
                .to_frame(),
        ))
        .await
        .unwrap();
    let center_ref = &center;
    eventually("pushed notification", || async move {
        center_ref.notification_count() == 1
    })
    .await;
    assert_eq!(center.visible_toasts().first().unwrap().title, "Đơn hàng #3");

    eventually("connected state", || async move {
        center_ref.channel_state() == ConnectionState::Connected
    })
    .await;
    assert!(center.send_notification(AccountId::new(8), "Chào", "Bạn có quà"));
    let sent = HubMessage::parse_frames(&within("client invocation", next_text(&mut socket)).await);
    assert_eq!(
        sent,
        [HubMessage::invocation(
            "SendNotification",
            vec![json!(8), json!("Chào"), json!("Bạn có quà")]
        )]
    );

    socket.close(None).await.unwrap();
    drop(socket);
    let (_socket, query) = accept_hub(&listener).await;
    assert_eq!(query.as_deref(), Some("access_token=tok-7"));
    eventually("reconnected state", || async move {
        center_ref.channel_state() == ConnectionState::Connected
    })
    .await;

    center.stop().await;
    assert_eq!(center.channel_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn chat_sends_as_signed_in_user_and_logs_replies() {
    let site = Site::start().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tab = hub_tab(&site, &listener).await;

    let chat = tab.chat();
    let _handle = chat.start().await;
    let (mut socket, _) = accept_hub(&listener).await;
    let chat_ref = &chat;
    eventually("connected state", || async move {
        chat_ref.channel_state() == ConnectionState::Connected
    })
    .await;

    assert!(chat.send("Còn size M không?").unwrap());
    let sent = HubMessage::parse_frames(&within("chat message", next_text(&mut socket)).await);
    assert_eq!(
        sent,
        [HubMessage::invocation(
            "SendMessage",
            vec![json!(7), json!("Còn size M không?")]
        )]
    );

    socket
        .send(Message::Text(
            HubMessage::invocation("ReceiveMessage", vec![json!("Bot"), json!("Còn hàng bạn nhé")])
                .to_frame(),
        ))
        .await
        .unwrap();
    eventually("bot reply", || async move { chat_ref.messages().len() == 2 }).await;

    let contents: Vec<_> = chat.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, ["Còn size M không?", "Còn hàng bạn nhé"]);

    chat.stop().await;
}
