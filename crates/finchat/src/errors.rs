use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Failures raised while executing a single tool call. These never abort an interaction:
/// the agent turns them into an error-shaped tool output the model can react to.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("{0}")]
    UnsafeQuery(String),

    #[error("{0}")]
    Binding(String),

    #[error("unknown tool '{0}'")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

impl ToolError {
    /// The output sent back to the model in place of a tool result
    pub fn to_output(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

impl From<rusqlite::Error> for ToolError {
    fn from(err: rusqlite::Error) -> Self {
        ToolError::ExecutionError(err.to_string())
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Failures of the interaction as a whole
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Model provider call failed: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
