//! One model turn per inbound message, with a fresh tool session each time.

use crate::conversation::Conversation;
use crate::error::Error;
use crate::model::Backend;
use crate::tools::{SessionBridge, SessionScope};
use tracing::{debug, error};

/// Outcome of a turn.
///
/// `text` holds whatever streamed before the turn ended; `error` is the
/// reason it ended early, if any.
#[derive(Debug, Default)]
pub struct Reply {
    pub text: String,
    pub error: Option<Error>,
}

/// Drives a conversation, scoping one tool session to each turn.
pub struct ChatService<B, S> {
    conversation: Conversation<B>,
    bridge: S,
}

impl<B: Backend, S: SessionBridge> ChatService<B, S> {
    pub fn new(conversation: Conversation<B>, bridge: S) -> Self {
        Self {
            conversation,
            bridge,
        }
    }

    pub fn conversation(&self) -> &Conversation<B> {
        &self.conversation
    }

    /// Send `text` and return the assembled reply.
    ///
    /// Errors are logged and swallowed; the reply is the text received
    /// before the failure.
    pub async fn send_message(&mut self, text: &str) -> String {
        self.turn(text, |_| {}).await.text
    }

    /// Run one turn, handing each text fragment to `on_text` as it arrives.
    pub async fn turn(&mut self, text: &str, mut on_text: impl FnMut(&str) + Send) -> Reply {
        let mut reply = Reply::default();
        if text.is_empty() {
            return reply;
        }

        let scope = match SessionScope::open(&self.bridge).await {
            Ok(scope) => scope,
            Err(e) => {
                error!(error = %e, "failed to open tool session");
                reply.error = Some(e.into());
                return reply;
            }
        };

        let mut stream = self.conversation.send_stream(text, scope.session());
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    on_text(&fragment);
                    reply.text.push_str(&fragment);
                }
                Err(e) => {
                    error!(error = %e, chars = reply.text.len(), "turn failed");
                    reply.error = Some(e);
                    break;
                }
            }
        }
        drop(stream);

        scope.release().await;
        debug!(chars = reply.text.len(), "turn complete");
        reply
    }
}
