//! Tool execution and per-turn provider sessions.

mod bridge;
mod empty;
pub mod errors;
mod host;
mod mcp_host;

pub use bridge::{SessionBridge, SessionScope, StdioBridge};
pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp_host::McpToolHost;
