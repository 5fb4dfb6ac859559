//! MCP (Model Context Protocol) client sessions over stdio.
//!
//! A [`ToolSession`] spawns a provider process through the rmcp SDK,
//! performs the handshake, lists its tools and calls them.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ProviderCommand, ToolOutput, ToolSession};
//!
//! # async fn example() -> mcp::Result<()> {
//! let command = ProviderCommand::new("car-value");
//! let session = ToolSession::open(&command).await?;
//!
//! for tool in session.tools() {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("model".into(), "sedan".into());
//! args.insert("year".into(), 2020.into());
//! let result = session.call_tool("get_car_value", Some(args)).await?;
//! println!("{}", result.joined_text());
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod output;
mod session;

pub use error::{BoxError, Error, Result};
pub use output::ToolOutput;
pub use rmcp::model::{CallToolResult, Content, Tool};
pub use session::{PASSTHROUGH_ENV, ProviderCommand, SHUTDOWN_GRACE, ToolSession};
