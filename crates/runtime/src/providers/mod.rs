//! LLM provider adapters.
//!
//! Each provider implements [`Backend`](crate::model::Backend) for its
//! specific API.

mod gemini;

pub use gemini::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiBackend, GeminiBackendBuilder, sanitize_schema,
};
