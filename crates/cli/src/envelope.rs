//! The JSON envelope spoken over `/ws`.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Senders the relay reports.
pub const AGENT: &str = "Agent";
pub const UNKNOWN: &str = "Unknown";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `{"type":"message"}`. A missing or non-string `message` reads as empty.
    Message {
        message: String,
        timestamp: Option<String>,
    },
    /// `{"type":"ping"}`.
    Ping,
    /// A JSON object with any other `type`, or none.
    Unsupported(Option<String>),
    /// Anything that is not a JSON object.
    Plain(String),
}

impl Inbound {
    pub fn decode(frame: &str) -> Self {
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(frame) else {
            return Self::Plain(frame.to_string());
        };

        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        match fields.get("type").and_then(Value::as_str) {
            Some("message") => Self::Message {
                message: text("message").unwrap_or_default(),
                timestamp: text("timestamp"),
            },
            Some("ping") => Self::Ping,
            Some(other) => Self::Unsupported(Some(other.to_string())),
            None => Self::Unsupported(None),
        }
    }
}

/// A server-originated frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    Message(ChatMessage),
    Pong { timestamp: String },
    System { message: String, timestamp: String },
}

/// A chat line as the browser renders it.
///
/// `isOwn` is always false: the server never speaks for the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    message: String,
    sender: String,
    timestamp: String,
    is_own: bool,
}

impl ChatMessage {
    pub fn new(
        message: impl Into<String>,
        sender: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            sender: sender.into(),
            timestamp: timestamp.into(),
            is_own: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl Envelope {
    pub fn pong() -> Self {
        Self::Pong { timestamp: now() }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
            timestamp: now(),
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Current time as RFC 3339 UTC.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
