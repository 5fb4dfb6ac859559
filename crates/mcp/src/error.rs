//! MCP error types.

use rmcp::service::ServiceError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn tool provider `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake with `{command}` failed: {source}")]
    Handshake {
        command: String,
        #[source]
        source: BoxError,
    },

    #[error("request failed: {0}")]
    Service(#[from] ServiceError),

    #[error("timeout waiting for `{0}`")]
    Timeout(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("session task failed: {0}")]
    Shutdown(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
