//! File modify tool — verbatim substring replacement inside the sandbox.

use crate::sandbox::Sandbox;
use async_trait::async_trait;
use deskclaw_core::error::ToolError;
use deskclaw_core::tool::{Tool, ToolOutput};
use std::sync::Arc;

pub struct ModifyFileTool {
    sandbox: Arc<Sandbox>,
}

impl ModifyFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ModifyFileTool {
    fn name(&self) -> &str {
        "modify_file"
    }

    fn description(&self) -> &str {
        "Replace content in a file. Every verbatim occurrence of old_content is replaced with new_content; no regex."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The file path to modify (relative to the working directory)"
                },
                "old_content": {
                    "type": "string",
                    "description": "The exact text to replace (must match verbatim)"
                },
                "new_content": {
                    "type": "string",
                    "description": "The replacement text"
                }
            },
            "required": ["file_path", "old_content", "new_content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let file_path = arguments["file_path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'file_path' argument".into()))?;
        let old_content = arguments["old_content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'old_content' argument".into()))?;
        let new_content = arguments["new_content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'new_content' argument".into()))?;

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

        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Ok(ToolOutput::failed(format!(
                    "'{file_path}' is not a text file or uses an unsupported encoding"
                ))
                .at_path(resolved));
            }
            Err(e) => {
                return Ok(
                    ToolOutput::failed(format!("Failed to read file: {e}")).at_path(resolved)
                );
            }
        };

        if !content.contains(old_content) {
            return Err(ToolError::ContentNotFound {
                path: file_path.to_string(),
            });
        }

        let count = content.matches(old_content).count();
        let modified = content.replace(old_content, new_content);

        // The post-replacement content is size-checked before anything is
        // written, so a failed modify leaves the file untouched.
        self.sandbox.check_size(modified.len() as u64)?;

        match tokio::fs::write(&resolved, &modified).await {
            Ok(()) => {
                let display = self.sandbox.display_path(&resolved);
                Ok(ToolOutput::ok(format!(
                    "Replaced {count} occurrence(s) in '{display}'"
                ))
                .at_path(resolved))
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

    fn setup() -> (tempfile::TempDir, ModifyFileTool) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::with_defaults(dir.path()).unwrap());
        (dir, ModifyFileTool::new(sandbox))
    }

    #[tokio::test]
    async fn replaces_all_occurrences() {
        let (dir, tool) = setup();
        std::fs::write(dir.path().join("config.py"), "DEBUG = False\n# DEBUG = False\n").unwrap();

        let result = tool
            .execute(serde_json::json!({
                "file_path": "config.py",
                "old_content": "DEBUG = False",
                "new_content": "DEBUG = True"
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("2 occurrence"));
        let content = std::fs::read_to_string(dir.path().join("config.py")).unwrap();
        assert_eq!(content, "DEBUG = True\n# DEBUG = True\n");
    }

    #[tokio::test]
    async fn missing_old_content_is_content_not_found() {
        let (dir, tool) = setup();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();

        let err = tool
            .execute(serde_json::json!({
                "file_path": "a.txt",
                "old_content": "goodbye",
                "new_content": "farewell"
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::ContentNotFound { .. }));
        // Nothing was written.
        let content = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn identical_old_and_new_is_idempotent() {
        let (dir, tool) = setup();
        std::fs::write(dir.path().join("a.txt"), "same text stays").unwrap();

        let result = tool
            .execute(serde_json::json!({
                "file_path": "a.txt",
                "old_content": "same text",
                "new_content": "same text"
            }))
            .await
            .unwrap();

        assert!(result.success);
        let content = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert_eq!(content, "same text stays");
    }

    #[tokio::test]
    async fn oversized_result_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::new(dir.path(), vec![".txt".into()], 16).unwrap());
        std::fs::write(dir.path().join("a.txt"), "short").unwrap();

        let tool = ModifyFileTool::new(sandbox);
        let err = tool
            .execute(serde_json::json!({
                "file_path": "a.txt",
                "old_content": "short",
                "new_content": "a replacement far longer than the limit"
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::FileTooLarge { .. }));
        let content = std::fs::read_to_string(dir.path().join("a.txt")).unwrap();
        assert_eq!(content, "short");
    }

    #[tokio::test]
    async fn nonexistent_file_reports_failure() {
        let (_dir, tool) = setup();
        let result = tool
            .execute(serde_json::json!({
                "file_path": "missing.txt",
                "old_content": "a",
                "new_content": "b"
            }))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("does not exist"));
    }

    #[tokio::test]
    async fn escape_rejected() {
        let (_dir, tool) = setup();
        let err = tool
            .execute(serde_json::json!({
                "file_path": "../outside.txt",
                "old_content": "a",
                "new_content": "b"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }
}
