//! File read tool — read file contents inside the sandbox.

use crate::sandbox::Sandbox;
use async_trait::async_trait;
use deskclaw_core::error::ToolError;
use deskclaw_core::tool::{Tool, ToolOutput};
use std::sync::Arc;

pub struct ReadFileTool {
    sandbox: Arc<Sandbox>,
}

impl ReadFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the full contents of a file. The path is relative to the working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The file path to read (relative to the working directory)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let file_path = arguments["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'file_path' argument".into()))?;

        let resolved = self.sandbox.resolve(file_path)?;
        self.sandbox.check_format(file_path)?;

        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(_) => {
                return Ok(ToolOutput::failed(format!("File '{file_path}' does not exist"))
                    .at_path(resolved));
            }
        };

        if !metadata.is_file() {
            return Ok(ToolOutput::failed(format!("'{file_path}' is not a file")).at_path(resolved));
        }

        self.sandbox.check_size(metadata.len())?;

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => {
                let display = self.sandbox.display_path(&resolved);
                Ok(ToolOutput::ok(format!("Contents of '{display}':\n\n{content}"))
                    .at_path(resolved))
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Ok(ToolOutput::failed(
                format!("'{file_path}' is not a text file or uses an unsupported encoding"),
            )
            .at_path(resolved)),
            Err(e) => {
                Ok(ToolOutput::failed(format!("Failed to read file: {e}")).at_path(resolved))
            }
        }
    }
}
