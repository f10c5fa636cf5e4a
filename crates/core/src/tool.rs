//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what let the agent act on the workspace: read, write, modify,
//! and list files inside the sandbox root.

use crate::error::ToolError;
use crate::transport::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// The outcome of one model-requested tool call, kept for the run trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool that was invoked
    pub tool_name: String,

    /// The raw argument JSON the model supplied
    pub arguments: serde_json::Value,

    /// The sandbox-resolved path, when the call was file-related
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<PathBuf>,

    /// Output text on success, error text on failure
    pub outcome: String,

    /// Whether the tool executed successfully
    pub success: bool,
}

/// The result of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (or a human-readable failure description)
    pub output: String,

    /// The sandbox-resolved path the tool operated on, if any
    pub resolved_path: Option<PathBuf>,
}

impl ToolOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            resolved_path: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            resolved_path: None,
        }
    }

    pub fn at_path(mut self, path: PathBuf) -> Self {
        self.resolved_path = Some(path);
        self
    }
}

/// The core Tool trait.
///
/// Each tool (read_file, write_file, modify_file, list_files) implements
/// this trait. Tools are registered in the ToolRegistry and made available
/// to the agent loop. Validation failures (sandbox escape, bad format,
/// oversized payloads) return `Err`; runtime I/O problems on a valid path
/// return `Ok` with `success: false` so the text reads like a tool result.
/// Either way the loop folds the outcome back into the conversation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolSpec for sending to the model.
    fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by name.
///
/// The agent loop uses this to:
/// 1. Get tool specs to send to the model
/// 2. Look up and execute tools when the model requests them
///
/// Name uniqueness is structural: registering a second tool under an
/// existing name replaces the first.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool specs (for sending to the model).
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.to_spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute a named tool with the given arguments.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
