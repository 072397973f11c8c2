//! Wire envelopes exchanged over `/ws`.
//!
//! Every frame is a JSON text message `{"type": ..., "data": ...}`.
//! Client frames are parsed in two steps so an unknown `type` and a
//! malformed body get different error replies.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use tycoon_types::{Alert, CompanyId, CompanyUpdate, TickState, UserId};

/// Reply text for a frame that is not a valid envelope.
pub const INVALID_FORMAT: &str = "Invalid message format";
/// Reply text for an envelope with an unknown `type`.
pub const UNKNOWN_TYPE: &str = "Unknown message type";
/// Reply text for `subscribe` before `auth`.
pub const NOT_AUTHENTICATED: &str = "Not authenticated";
/// Reply text for `auth` without a token.
pub const NO_TOKEN: &str = "No token provided";
/// Reply text for a token that fails verification.
pub const INVALID_TOKEN: &str = "Invalid token";

/// A frame could not be turned into a [`ClientMessage`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Not JSON, or the body does not fit the `type`.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid envelope with a `type` the hub does not handle.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

impl ProtocolError {
    /// Text sent back to the client in an `error` envelope.
    pub const fn reply(&self) -> &'static str {
        match self {
            Self::Malformed(_) => INVALID_FORMAT,
            Self::UnknownType(_) => UNKNOWN_TYPE,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct AuthData {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct SubscribeData {
    channel: String,
}

/// A message sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Present a credential token.
    Auth {
        /// The token, if the client sent one.
        token: Option<String>,
    },
    /// Ask for a named channel. Every authenticated connection already
    /// receives every stream, so this is acknowledged only.
    Subscribe {
        /// Channel name, echoed back.
        channel: String,
    },
    /// Application-level ping.
    Ping,
}

impl ClientMessage {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let data = if envelope.data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            envelope.data
        };
        match envelope.kind.as_str() {
            "auth" => {
                let AuthData { token } = serde_json::from_value(data)?;
                Ok(Self::Auth {
                    token: token.filter(|t| !t.is_empty()),
                })
            }
            "subscribe" => {
                let SubscribeData { channel } = serde_json::from_value(data)?;
                Ok(Self::Subscribe { channel })
            }
            "ping" => Ok(Self::Ping),
            other => Err(ProtocolError::UnknownType(other.to_owned())),
        }
    }
}

/// A message sent by the hub. Borrowed payloads let one broadcast be
/// encoded once and shared by every connection.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage<'a> {
    /// First frame on every connection.
    #[serde(rename = "connected")]
    Connected {
        /// Greeting text.
        message: &'a str,
    },
    /// The token was accepted.
    #[serde(rename = "auth_success", rename_all = "camelCase")]
    AuthSuccess {
        /// Authenticated user.
        user_id: UserId,
        /// The user's company, when the token names one.
        company_id: Option<CompanyId>,
    },
    /// The token was missing or rejected.
    #[serde(rename = "auth_error")]
    AuthError {
        /// Why.
        message: &'a str,
    },
    /// Subscription acknowledged.
    #[serde(rename = "subscribed")]
    Subscribed {
        /// Channel name as sent.
        channel: &'a str,
    },
    /// Reply to an application ping.
    #[serde(rename = "pong")]
    Pong {
        /// Server time in Unix milliseconds.
        timestamp: i64,
    },
    /// A completed tick.
    #[serde(rename = "tick:update")]
    TickUpdate(&'a TickState),
    /// An alert for the connection's company.
    #[serde(rename = "alert")]
    Alert(&'a Alert),
    /// New balances and reputation for the connection's company.
    #[serde(rename = "player:update")]
    PlayerUpdate(&'a CompanyUpdate),
    /// The previous client frame could not be handled.
    #[serde(rename = "error")]
    Error {
        /// Why.
        message: &'a str,
    },
}

impl ServerMessage<'_> {
    /// Encode as a text frame payload.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}
