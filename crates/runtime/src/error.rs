use crate::model::ModelError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    SessionInit(#[from] SessionInitError),

    #[error("stream error: {0}")]
    Stream(#[from] ModelError),
}

/// A tool provider could not be started or failed its handshake.
#[derive(Debug, Error)]
#[error("tool session init failed: {0}")]
pub struct SessionInitError(#[source] pub BoxError);

impl SessionInitError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self(source.into())
    }
}

impl From<mcp::Error> for SessionInitError {
    fn from(e: mcp::Error) -> Self {
        Self(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
