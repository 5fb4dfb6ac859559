use crate::model::{Backend, Message};
use crate::tools::ToolHost;
use crate::turn::TurnStream;

/// Sampling temperature for every request: replies are reproducible given
/// the same model and tool state.
pub(crate) const TEMPERATURE: f32 = 0.0;

/// A stateful exchange with one model backend.
///
/// History only grows through turns that run to completion.
pub struct Conversation<B> {
    pub(crate) backend: B,
    pub(crate) history: Vec<Message>,
    pub(crate) system: Option<String>,
}

impl<B: Backend> Conversation<B> {
    /// Start an empty conversation.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            history: Vec::new(),
            system: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Send `text` and stream the reply, advertising only `tools`.
    ///
    /// Nothing is requested until the returned stream is first polled.
    pub fn send_stream<'a, T: ToolHost>(
        &'a mut self,
        text: &str,
        tools: &'a T,
    ) -> TurnStream<'a, B, T> {
        TurnStream::new(self, Message::user(text), tools)
    }
}
