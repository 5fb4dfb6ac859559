//! Conversation runtime: model streaming and per-turn tool sessions.
//!
//! # Overview
//!
//! - **Backend**: a trait over streaming LLM providers; [`GeminiBackend`] is
//!   the one shipped here.
//! - **SessionBridge**: starts a tool provider for one turn and tears it
//!   down afterwards. [`StdioBridge`] spawns an MCP server per session.
//! - **Conversation**: history plus sampling settings; each turn is read
//!   through a lazy [`TurnStream`].
//! - **ChatService**: glues the two together, one scoped session per
//!   message, folding streamed text into a reply.
//!
//! # Example
//!
//! ```no_run
//! use runtime::{ChatService, Conversation, GeminiBackend, StdioBridge};
//! use mcp::ProviderCommand;
//!
//! # async fn example() {
//! let backend = GeminiBackend::builder("api-key").build();
//! let bridge = StdioBridge::new(ProviderCommand::new("car-value"));
//! let mut chat = ChatService::new(Conversation::new(backend), bridge);
//!
//! let reply = chat.send_message("What is a 2015 sedan worth?").await;
//! println!("{reply}");
//! # }
//! ```

mod chat;
mod conversation;
mod error;
pub mod model;
pub mod providers;
#[cfg(test)]
mod testing;
pub mod tools;
mod turn;

pub use chat::{ChatService, Reply};
pub use conversation::Conversation;
pub use error::{Error, Result, SessionInitError};
pub use model::{Backend, Message, ModelError, Part, Role, StreamChunk, ToolCall, ToolSpec};
pub use providers::{GeminiBackend, GeminiBackendBuilder};
pub use tools::{
    EmptyToolHost, McpToolHost, SessionBridge, SessionScope, StdioBridge, ToolError, ToolHost,
};
pub use turn::{MAX_TOOL_ROUNDS, TurnStream};
