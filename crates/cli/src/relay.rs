//! Frame-level relay between a client and a [`ChatService`].

use crate::envelope::{AGENT, ChatMessage, Envelope, Inbound, UNKNOWN, now};
use runtime::{Backend, ChatService, SessionBridge};
use serde::Deserialize;
use tracing::{debug, error, warn};

/// How frames are framed on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// JSON envelopes with `message` / `ping` types.
    #[default]
    Json,
    /// Raw text in, raw reply text out.
    Plain,
}

/// Turns inbound frames into outbound frames, one at a time.
pub struct Relay<B, S> {
    chat: ChatService<B, S>,
    dialect: Dialect,
}

impl<B: Backend, S: SessionBridge> Relay<B, S> {
    pub fn new(chat: ChatService<B, S>, dialect: Dialect) -> Self {
        Self { chat, dialect }
    }

    /// Handle one text frame. `None` means nothing is sent back.
    pub async fn handle_frame(&mut self, frame: &str) -> Option<String> {
        match self.dialect {
            Dialect::Plain if frame.trim().is_empty() => None,
            Dialect::Plain => Some(self.chat.send_message(frame).await),
            Dialect::Json => {
                let envelope = self.handle_envelope(Inbound::decode(frame)).await;
                match envelope.encode() {
                    Ok(text) => Some(text),
                    Err(e) => {
                        error!(error = %e, "failed to encode envelope");
                        None
                    }
                }
            }
        }
    }

    async fn handle_envelope(&mut self, inbound: Inbound) -> Envelope {
        match inbound {
            Inbound::Plain(text) => {
                debug!("frame is not a JSON object; echoing as plain text");
                Envelope::Message(ChatMessage::new(text, UNKNOWN, now()))
            }
            Inbound::Message { message, timestamp } => {
                let timestamp = timestamp.unwrap_or_else(now);
                let reply = if message.is_empty() {
                    message
                } else {
                    self.chat.send_message(&message).await
                };
                Envelope::Message(ChatMessage::new(reply, AGENT, timestamp))
            }
            Inbound::Ping => Envelope::pong(),
            Inbound::Unsupported(kind) => {
                let description = match &kind {
                    Some(kind) => format!("unsupported message type: {kind}"),
                    None => "missing message type".to_string(),
                };
                warn!(kind = kind.as_deref().unwrap_or(""), "{description}");
                Envelope::system(description)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use runtime::model::{ChunkStream, ModelError, ModelRequest};
    use runtime::{Conversation, EmptyToolHost, SessionInitError, StreamChunk};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with the same fragments to every request.
    #[derive(Clone)]
    struct Canned {
        fragments: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Backend for Canned {
        async fn stream(&self, _request: ModelRequest<'_>) -> Result<ChunkStream, ModelError> {
            use futures::StreamExt;
            self.calls.fetch_add(1, Ordering::SeqCst);
            let chunks: Vec<Result<StreamChunk, ModelError>> =
                self.fragments.iter().map(|t| Ok(StreamChunk::text(*t))).collect();
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    struct NoTools;

    impl SessionBridge for NoTools {
        type Session = EmptyToolHost;

        async fn open(&self) -> Result<EmptyToolHost, SessionInitError> {
            Ok(EmptyToolHost)
        }

        async fn release(&self, _session: EmptyToolHost) {}
    }

    fn relay(dialect: Dialect) -> (Relay<Canned, NoTools>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Canned {
            fragments: vec!["hel", "lo"],
            calls: calls.clone(),
        };
        let chat = ChatService::new(Conversation::new(backend), NoTools);
        (Relay::new(chat, dialect), calls)
    }

    async fn exchange(relay: &mut Relay<Canned, NoTools>, frame: &str) -> Value {
        let reply = relay.handle_frame(frame).await.unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn message_gets_agent_reply() {
        let (mut relay, calls) = relay(Dialect::Json);

        let reply = exchange(&mut relay, r#"{"type":"message","message":"hi"}"#).await;

        assert_eq!(reply["type"], "message");
        assert_eq!(reply["message"], "hello");
        assert_eq!(reply["sender"], "Agent");
        assert_eq!(reply["isOwn"], false);
        assert!(reply["timestamp"].is_string());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inbound_timestamp_is_echoed() {
        let (mut relay, _) = relay(Dialect::Json);

        let reply = exchange(
            &mut relay,
            r#"{"type":"message","message":"hi","timestamp":"2024-05-01T12:00:00Z"}"#,
        )
        .await;

        assert_eq!(reply["timestamp"], "2024-05-01T12:00:00Z");
    }

    #[tokio::test]
    async fn empty_message_skips_model() {
        let (mut relay, calls) = relay(Dialect::Json);

        let reply = exchange(&mut relay, r#"{"type":"message","message":""}"#).await;

        assert_eq!(reply["message"], "");
        assert_eq!(reply["sender"], "Agent");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn raw_text_is_echoed_from_unknown() {
        let (mut relay, calls) = relay(Dialect::Json);

        let reply = exchange(&mut relay, "hello").await;

        assert_eq!(reply["type"], "message");
        assert_eq!(reply["message"], "hello");
        assert_eq!(reply["sender"], "Unknown");
        assert_eq!(reply["isOwn"], false);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ping_gets_one_fresh_pong() {
        let (mut relay, calls) = relay(Dialect::Json);
        let before = Utc::now();

        let reply = exchange(&mut relay, r#"{"type":"ping"}"#).await;

        let fields = reply.as_object().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["type"], "pong");
        let sent = DateTime::parse_from_rfc3339(fields["timestamp"].as_str().unwrap()).unwrap();
        assert!(sent.with_timezone(&Utc) >= before);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identical_pings_get_identical_shapes() {
        let (mut relay, _) = relay(Dialect::Json);

        let first = exchange(&mut relay, r#"{"type":"ping"}"#).await;
        let second = exchange(&mut relay, r#"{"type":"ping"}"#).await;

        let keys = |v: &Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&first), keys(&second));
        assert_eq!(first["type"], second["type"]);
    }

    #[tokio::test]
    async fn unsupported_type_gets_system_notice() {
        let (mut relay, calls) = relay(Dialect::Json);

        let reply = exchange(&mut relay, r#"{"type":"user_count","count":3}"#).await;

        assert_eq!(reply["type"], "system");
        assert_eq!(reply["message"], "unsupported message type: user_count");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let reply = exchange(&mut relay, r#"{"message":"hi"}"#).await;
        assert_eq!(
            reply,
            json!({
                "type": "system",
                "message": "missing message type",
                "timestamp": reply["timestamp"],
            })
        );
    }

    #[tokio::test]
    async fn plain_dialect_relays_raw_text() {
        let (mut relay, calls) = relay(Dialect::Plain);

        assert_eq!(relay.handle_frame("hi").await.as_deref(), Some("hello"));
        assert_eq!(
            relay.handle_frame(r#"{"type":"ping"}"#).await.as_deref(),
            Some("hello")
        );
        assert_eq!(relay.handle_frame("  ").await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
