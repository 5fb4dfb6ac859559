//! Transports for the tool relay: a WebSocket server and a terminal loop.

pub mod config;
pub mod envelope;
pub mod error;
pub mod relay;
pub mod server;
pub mod terminal;
mod ws;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use relay::{Dialect, Relay};
pub use server::{AppState, build_router, serve};
pub use terminal::Terminal;
