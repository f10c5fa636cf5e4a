//! File write tool — create or overwrite files inside the sandbox.

use crate::sandbox::Sandbox;
use async_trait::async_trait;
use deskclaw_core::error::ToolError;
use deskclaw_core::tool::{Tool, ToolOutput};
use std::sync::Arc;

pub struct WriteFileTool {
    sandbox: Arc<Sandbox>,
}

impl WriteFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create a new file or overwrite an existing one with the given content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The file path to write (relative to the working directory)"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let file_path = arguments["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'file_path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        // All validation happens before any filesystem mutation.
        let resolved = self.sandbox.resolve(file_path)?;
        self.sandbox.check_format(file_path)?;
        self.sandbox.check_size(content.len() as u64)?;

        if let Some(parent) = resolved.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(
                ToolOutput::failed(format!("Failed to create directory: {e}")).at_path(resolved)
            );
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => {
                let display = self.sandbox.display_path(&resolved);
                Ok(
                    ToolOutput::ok(format!("Wrote {} bytes to '{display}'", content.len()))
                        .at_path(resolved),
                )
            }
            Err(e) => {
                Ok(ToolOutput::failed(format!("Failed to write file: {e}")).at_path(resolved))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, WriteFileTool) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::with_defaults(dir.path()).unwrap());
        (dir, WriteFileTool::new(sandbox))
    }

    #[test]
    fn tool_definition() {
        let (_dir, tool) = setup();
        assert_eq!(tool.name(), "write_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["file_path", "content"]));
    }

    #[tokio::test]
    async fn write_and_verify() {
        let (dir, tool) = setup();
        let result = tool
            .execute(serde_json::json!({
                "file_path": "output.txt",
                "content": "Hello from test!"
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("16 bytes"));
        let content = std::fs::read_to_string(dir.path().join("output.txt")).unwrap();
        assert_eq!(content, "Hello from test!");
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let (dir, tool) = setup();
        let result = tool
            .execute(serde_json::json!({
                "file_path": "nested/dir/file.txt",
                "content": "nested content"
            }))
            .await
            .unwrap();

        assert!(result.success);
        let content = std::fs::read_to_string(dir.path().join("nested/dir/file.txt")).unwrap();
        assert_eq!(content, "nested content");
    }

    #[tokio::test]
    async fn overwrite_existing_file() {
        let (dir, tool) = setup();
        std::fs::write(dir.path().join("overwrite.txt"), "old content").unwrap();

        let result = tool
            .execute(serde_json::json!({
                "file_path": "overwrite.txt",
                "content": "new content"
            }))
            .await
            .unwrap();

        assert!(result.success);
        let content = std::fs::read_to_string(dir.path().join("overwrite.txt")).unwrap();
        assert_eq!(content, "new content");
    }

    #[tokio::test]
    async fn oversized_payload_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::new(dir.path(), vec![".txt".into()], 8).unwrap());
        let tool = WriteFileTool::new(sandbox);

        let err = tool
            .execute(serde_json::json!({
                "file_path": "big.txt",
                "content": "more than eight bytes"
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::FileTooLarge { .. }));
        assert!(!dir.path().join("big.txt").exists());
    }

    #[tokio::test]
    async fn escape_rejected_without_writing() {
        let (_dir, tool) = setup();
        let err = tool
            .execute(serde_json::json!({
                "file_path": "../evil.txt",
                "content": "payload"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }

    #[tokio::test]
    async fn missing_content_argument() {
        let (_dir, tool) = setup();
        let err = tool
            .execute(serde_json::json!({"file_path": "a.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
