//! Lazy, single-pass reply stream for one conversational turn.

use crate::conversation::{Conversation, TEMPERATURE};
use crate::error::{Error, Result};
use crate::model::{
    Backend, ChunkStream, Message, ModelRequest, Part, Role, StreamChunk, ToolCall, ToolOutcome,
    ToolResult,
};
use crate::tools::ToolHost;
use futures::StreamExt;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Tool rounds allowed before a turn is cut off.
pub const MAX_TOOL_ROUNDS: usize = 10;

/// Text fragments of one turn, in arrival order.
///
/// Tool calls requested by the model are executed between rounds and never
/// surface here. If the stream is dropped or fails before the model is done,
/// the conversation history is restored to its state before the turn.
pub struct TurnStream<'a, B, T> {
    conversation: &'a mut Conversation<B>,
    tools: &'a T,
    checkpoint: usize,
    stream: Option<ChunkStream>,
    buffered: VecDeque<String>,
    reply: Vec<Part>,
    rounds: usize,
    finished: bool,
    completed: bool,
}

impl<'a, B: Backend, T: ToolHost> TurnStream<'a, B, T> {
    pub(crate) fn new(conversation: &'a mut Conversation<B>, user: Message, tools: &'a T) -> Self {
        let checkpoint = conversation.history.len();
        conversation.history.push(user);
        Self {
            conversation,
            tools,
            checkpoint,
            stream: None,
            buffered: VecDeque::new(),
            reply: Vec::new(),
            rounds: 0,
            finished: false,
            completed: false,
        }
    }

    /// The next text fragment, an error that ended the turn, or `None`.
    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(text) = self.buffered.pop_front() {
                return Some(Ok(text));
            }
            if self.finished {
                return None;
            }

            if self.stream.is_none() {
                match self.start_round().await {
                    Ok(stream) => self.stream = Some(stream),
                    Err(e) => return Some(Err(self.fail(e))),
                }
            }

            let next = match self.stream.as_mut() {
                Some(stream) => stream.next().await,
                None => None,
            };
            match next {
                Some(Ok(chunk)) => self.absorb(chunk),
                Some(Err(e)) => return Some(Err(self.fail(e.into()))),
                None => {
                    self.stream = None;
                    self.end_round().await;
                }
            }
        }
    }

    async fn start_round(&mut self) -> Result<ChunkStream> {
        let conversation = &*self.conversation;
        let request = ModelRequest {
            messages: &conversation.history,
            tools: self.tools.specs(),
            system: conversation.system.as_deref(),
            temperature: TEMPERATURE,
        };
        Ok(conversation.backend.stream(request).await?)
    }

    fn absorb(&mut self, chunk: StreamChunk) {
        for part in chunk.into_parts() {
            match part {
                Part::Text(text) if text.is_empty() => {}
                Part::Text(text) => {
                    match self.reply.last_mut() {
                        Some(Part::Text(last)) => last.push_str(&text),
                        _ => self.reply.push(Part::Text(text.clone())),
                    }
                    self.buffered.push_back(text);
                }
                Part::ToolCall(call) => self.reply.push(Part::ToolCall(call)),
                Part::ToolResult(_) => {}
            }
        }
    }

    /// Record the model's message, then either run its tool calls or finish.
    async fn end_round(&mut self) {
        let mut parts = std::mem::take(&mut self.reply);
        let calls: Vec<ToolCall> = parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect();

        let limited = !calls.is_empty() && self.rounds >= MAX_TOOL_ROUNDS;
        if limited {
            warn!(
                rounds = self.rounds,
                skipped = calls.len(),
                "tool round limit reached; ending turn"
            );
            parts.retain(|part| !matches!(part, Part::ToolCall(_)));
        }

        if !parts.is_empty() {
            self.conversation.history.push(Message {
                role: Role::Assistant,
                parts,
            });
        }

        if calls.is_empty() || limited {
            self.finished = true;
            self.completed = true;
            return;
        }

        self.rounds += 1;
        let tools = self.tools;
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            results.push(execute(tools, call).await);
        }
        self.conversation.history.push(Message::tool_results(results));
    }

    fn fail(&mut self, error: Error) -> Error {
        self.finished = true;
        self.stream = None;
        self.buffered.clear();
        self.rollback();
        error
    }

    fn rollback(&mut self) {
        self.conversation.history.truncate(self.checkpoint);
    }
}

impl<B, T> Drop for TurnStream<'_, B, T> {
    fn drop(&mut self) {
        if !self.completed {
            self.conversation.history.truncate(self.checkpoint);
        }
    }
}

async fn execute<T: ToolHost>(tools: &T, call: &ToolCall) -> ToolResult {
    debug!(tool = %call.name, id = %call.id, "executing tool call");
    let outcome = match tools.execute(call).await {
        Ok(output) => ToolOutcome::Success { output },
        Err(e) => {
            warn!(tool = %call.name, error = %e, "tool call failed");
            ToolOutcome::Error {
                message: e.to_string(),
            }
        }
    };
    ToolResult {
        tool_call_id: call.id.clone(),
        name: call.name.clone(),
        outcome,
    }
}
