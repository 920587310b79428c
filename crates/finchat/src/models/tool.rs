use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::errors::{ToolError, ToolResult};

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema of the arguments the tool accepts
    pub parameters: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool call requested by the model.
///
/// `arguments` is kept as the raw JSON text the model produced: it is echoed back verbatim in
/// the next round so the provider can correlate the output by `call_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new<I, N, A>(call_id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the raw arguments into a JSON object. Empty arguments are an empty object.
    pub fn parsed_arguments(&self) -> ToolResult<Map<String, Value>> {
        if self.arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(Map::new()),
            Ok(other) => Err(ToolError::InvalidParameters(format!(
                "arguments for call {} must be a JSON object, got {}",
                self.call_id, other
            ))),
            Err(e) => Err(ToolError::InvalidParameters(format!(
                "Could not interpret tool arguments for call {}: {}",
                self.call_id, e
            ))),
        }
    }
}

/// The serialized result of a tool call, matched to it by `call_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub call_id: String,
    pub result: Value,
}

impl ToolOutput {
    pub fn new<S: Into<String>>(call_id: S, result: Value) -> Self {
        Self {
            call_id: call_id.into(),
            result,
        }
    }

    pub fn is_error(&self) -> bool {
        self.result.get("error").is_some()
    }
}
