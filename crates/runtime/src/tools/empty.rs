//! Empty tool host implementation.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::{ToolError, ToolHost};
use serde_json::Value;

/// A tool host that advertises nothing.
///
/// Turns run against it are plain text exchanges.
#[derive(Debug, Default)]
pub struct EmptyToolHost;

impl ToolHost for EmptyToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &[]
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        Err(ToolError::NotFound(call.name.clone()))
    }
}
