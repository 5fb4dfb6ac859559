//! MCP-backed tool host.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::{ToolError, ToolHost};
use mcp::{ProviderCommand, Tool, ToolOutput, ToolSession};
use serde_json::Value;

/// Tool host backed by one live provider session.
pub struct McpToolHost {
    session: ToolSession,
    specs: Vec<ToolSpec>,
}

impl McpToolHost {
    /// Spawn the provider and cache its tool specs.
    pub async fn open(command: &ProviderCommand) -> mcp::Result<Self> {
        let session = ToolSession::open(command).await?;
        let specs = session.tools().iter().map(spec_from_tool).collect();
        Ok(Self { session, specs })
    }

    /// OS process id of the provider.
    pub fn pid(&self) -> Option<u32> {
        self.session.pid()
    }

    /// Shut the provider down and wait for it.
    pub async fn close(self) -> mcp::Result<()> {
        self.session.close().await
    }
}

fn spec_from_tool(tool: &Tool) -> ToolSpec {
    ToolSpec {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_string(),
        schema: Value::Object(tool.input_schema.as_ref().clone()),
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let arguments = match &call.input {
            Value::Object(map) => Some(map.clone()),
            Value::Null => None,
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "arguments must be an object, got {other}"
                )));
            }
        };

        let result = self
            .session
            .call_tool(&call.name, arguments)
            .await
            .map_err(|e| match e {
                mcp::Error::ToolNotFound(name) => ToolError::NotFound(name),
                e => ToolError::Execution(e.to_string()),
            })?;

        if result.failed() {
            return Err(ToolError::Execution(result.joined_text()));
        }

        Ok(result
            .structured_content
            .clone()
            .unwrap_or_else(|| Value::String(result.joined_text())))
    }
}
