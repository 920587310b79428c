use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::Tool;

pub mod finance;

/// Implementation of a tool: parsed arguments in, serializable result out
pub type ToolHandler = Arc<dyn Fn(Map<String, Value>) -> ToolResult<Value> + Send + Sync>;

/// Open mapping from tool name to its declared schema and implementation.
///
/// The set of tools is data: anything registered here is declared to the model and callable by
/// name. Schemas are declared in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool of the same name
    pub fn register<F>(&mut self, tool: Tool, handler: F)
    where
        F: Fn(Map<String, Value>) -> ToolResult<Value> + Send + Sync + 'static,
    {
        self.tools.retain(|t| t.name != tool.name);
        self.handlers.insert(tool.name.clone(), Arc::new(handler));
        self.tools.push(tool);
    }

    pub fn with<F>(mut self, tool: Tool, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> ToolResult<Value> + Send + Sync + 'static,
    {
        self.register(tool, handler);
        self
    }

    /// Declared schemas of every registered tool
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ToolHandler> {
        self.handlers.get(name).cloned()
    }

    /// Run a tool on the blocking pool. A panicking tool is reported as an execution error.
    pub async fn call(&self, name: &str, arguments: Map<String, Value>) -> ToolResult<Value> {
        let handler = self
            .get(name)
            .ok_or_else(|| ToolError::ToolNotFound(name.to_string()))?;

        tokio::task::spawn_blocking(move || handler(arguments))
            .await
            .map_err(|e| ToolError::ExecutionError(format!("tool '{}' did not complete: {}", name, e)))?
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .finish()
    }
}
