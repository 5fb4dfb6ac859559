//! Reading tool results.

use rmcp::model::CallToolResult;

/// Convenience accessors for [`CallToolResult`].
pub trait ToolOutput {
    /// All text content blocks, newline-joined.
    fn joined_text(&self) -> String;

    /// Whether the tool reported a failure.
    fn failed(&self) -> bool;
}

impl ToolOutput for CallToolResult {
    fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn failed(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}
