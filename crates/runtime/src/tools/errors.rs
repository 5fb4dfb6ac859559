use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// None of these end a turn; they are reported back to the model.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    Execution(String),
}
