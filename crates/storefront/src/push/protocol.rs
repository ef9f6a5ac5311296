//! SignalR JSON hub protocol framing.
//!
//! Every message is a JSON object terminated by the record separator
//! `0x1E`; one WebSocket text frame may carry several. Only the message types
//! a client channel needs are modelled: invocations in both directions,
//! keep-alive pings, and close. Anything else the hub sends (completions,
//! stream items, acks) is skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PushError;

/// Terminates every protocol record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

const INVOCATION: u8 = 1;
const PING: u8 = 6;
const CLOSE: u8 = 7;

/// A hub message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubMessage {
    /// Call `target` with positional `arguments`. Sent without an invocation
    /// id, so the receiver never replies.
    Invocation {
        target: String,
        arguments: Vec<Value>,
    },
    Ping,
    /// Connection is closing; `error` is set when the hub closed it on failure.
    Close { error: Option<String> },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl HubMessage {
    /// Invocation of `target`.
    #[must_use]
    pub fn invocation(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::Invocation {
            target: target.into(),
            arguments,
        }
    }

    /// Encode as one record, separator included.
    #[must_use]
    pub fn to_frame(&self) -> String {
        let wire = match self {
            Self::Invocation { target, arguments } => WireMessage {
                kind: INVOCATION,
                target: Some(target.clone()),
                arguments: Some(arguments.clone()),
                error: None,
            },
            Self::Ping => WireMessage {
                kind: PING,
                target: None,
                arguments: None,
                error: None,
            },
            Self::Close { error } => WireMessage {
                kind: CLOSE,
                target: None,
                arguments: None,
                error: error.clone(),
            },
        };
        // A struct of strings and JSON values always serializes
        let mut frame = serde_json::to_string(&wire).unwrap_or_default();
        frame.push(RECORD_SEPARATOR);
        frame
    }

    /// Decode every record in a text frame.
    ///
    /// Malformed records are logged and skipped so one bad message does not
    /// tear down the connection.
    #[must_use]
    pub fn parse_frames(text: &str) -> Vec<Self> {
        text.split(RECORD_SEPARATOR)
            .filter(|record| !record.trim().is_empty())
            .filter_map(|record| match serde_json::from_str::<WireMessage>(record) {
                Ok(wire) => Self::from_wire(wire),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed hub record");
                    None
                }
            })
            .collect()
    }

    fn from_wire(wire: WireMessage) -> Option<Self> {
        match wire.kind {
            INVOCATION => Some(Self::Invocation {
                target: wire.target?,
                arguments: wire.arguments.unwrap_or_default(),
            }),
            PING => Some(Self::Ping),
            CLOSE => Some(Self::Close { error: wire.error }),
            other => {
                tracing::trace!(kind = other, "Ignoring hub message type");
                None
            }
        }
    }
}

/// The client's opening record.
#[must_use]
pub fn handshake_request() -> String {
    format!(r#"{{"protocol":"json","version":1}}{RECORD_SEPARATOR}"#)
}

/// Validate the hub's handshake reply.
///
/// Returns whatever followed the reply in the same frame, which may already
/// hold messages.
///
/// # Errors
///
/// Returns `PushError::Handshake` if the reply is incomplete, malformed, or
/// carries an error.
pub fn parse_handshake_response(text: &str) -> Result<&str, PushError> {
    #[derive(Deserialize)]
    struct HandshakeReply {
        #[serde(default)]
        error: Option<String>,
    }

    let (reply, rest) = text
        .split_once(RECORD_SEPARATOR)
        .ok_or_else(|| PushError::Handshake("incomplete handshake reply".to_string()))?;

    let reply: HandshakeReply =
        serde_json::from_str(reply).map_err(|e| PushError::Handshake(e.to_string()))?;
    match reply.error {
        Some(error) => Err(PushError::Handshake(error)),
        None => Ok(rest),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_invocation_frame() {
        let frame = HubMessage::invocation("SendMessage", vec![json!(7), json!("xin chào")]).to_frame();
        assert!(frame.ends_with(RECORD_SEPARATOR));
        let value: Value = serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(
            value,
            json!({"type": 1, "target": "SendMessage", "arguments": [7, "xin chào"]})
        );
    }

    #[test]
    fn test_parse_multiple_records_skipping_unknown() {
        let text = concat!(
            r#"{"type":1,"target":"ReceiveNotification","arguments":["Đơn hàng","Đã giao"]}"#,
            "\u{1e}",
            r#"{"type":3,"invocationId":"1","result":null}"#,
            "\u{1e}",
            r#"{"type":6}"#,
            "\u{1e}",
            "not json\u{1e}",
            r#"{"type":7,"error":"Server shutting down"}"#,
            "\u{1e}",
        );
        assert_eq!(
            HubMessage::parse_frames(text),
            vec![
                HubMessage::invocation("ReceiveNotification", vec![json!("Đơn hàng"), json!("Đã giao")]),
                HubMessage::Ping,
                HubMessage::Close {
                    error: Some("Server shutting down".to_string())
                },
            ]
        );
    }

    #[test]
    fn test_handshake() {
        assert_eq!(handshake_request(), "{\"protocol\":\"json\",\"version\":1}\u{1e}");
        assert_eq!(parse_handshake_response("{}\u{1e}").unwrap(), "");
        assert_eq!(
            parse_handshake_response("{}\u{1e}{\"type\":6}\u{1e}").unwrap(),
            "{\"type\":6}\u{1e}"
        );
        assert!(matches!(
            parse_handshake_response("{\"error\":\"Unsupported protocol\"}\u{1e}"),
            Err(PushError::Handshake(e)) if e == "Unsupported protocol"
        ));
        assert!(parse_handshake_response("{}").is_err());
    }
}
