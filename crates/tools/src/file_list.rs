//! Directory listing tool — immediate children only.

use crate::sandbox::{Sandbox, human_size};
use async_trait::async_trait;
use deskclaw_core::error::ToolError;
use deskclaw_core::tool::{Tool, ToolOutput};
use std::sync::Arc;

pub struct ListFilesTool {
    sandbox: Arc<Sandbox>,
}

impl ListFilesTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the files and subdirectories directly inside a directory. Defaults to the working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "The directory to list (relative to the working directory)",
                    "default": "."
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let directory = arguments["directory"].as_str().unwrap_or(".");

        let resolved = self.sandbox.resolve(directory)?;

        let metadata = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(_) => {
                return Ok(ToolOutput::failed(format!(
                    "Directory '{directory}' does not exist"
                ))
                .at_path(resolved));
            }
        };
        if !metadata.is_dir() {
            return Ok(
                ToolOutput::failed(format!("'{directory}' is not a directory")).at_path(resolved)
            );
        }

        let mut entries = match tokio::fs::read_dir(&resolved).await {
            Ok(e) => e,
            Err(e) => {
                return Ok(
                    ToolOutput::failed(format!("Failed to list directory: {e}")).at_path(resolved)
                );
            }
        };

        let mut directories: Vec<String> = Vec::new();
        let mut files: Vec<String> = Vec::new();

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.metadata().await {
                Ok(m) if m.is_dir() => directories.push(format!("{name}/")),
                Ok(m) => files.push(format!("{name} ({})", human_size(m.len()))),
                Err(_) => files.push(name),
            }
        }

        directories.sort();
        files.sort();

        let display = self.sandbox.display_path(&resolved);

        if directories.is_empty() && files.is_empty() {
            return Ok(ToolOutput::ok(format!("Directory '{display}' is empty")).at_path(resolved));
        }

        let mut lines = vec![format!("Contents of '{display}':"), String::new()];
        if !directories.is_empty() {
            lines.push("Directories:".into());
            lines.extend(directories.iter().map(|d| format!("  {d}")));
            lines.push(String::new());
        }
        if !files.is_empty() {
            lines.push("Files:".into());
            lines.extend(files.iter().map(|f| format!("  {f}")));
        }
        lines.push(String::new());
        lines.push(format!(
            "Total: {} directories, {} files",
            directories.len(),
            files.len()
        ));

        Ok(ToolOutput::ok(lines.join("\n")).at_path(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, ListFilesTool) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::with_defaults(dir.path()).unwrap());
        (dir, ListFilesTool::new(sandbox))
    }

    #[tokio::test]
    async fn lists_files_and_directories() {
        let (dir, tool) = setup();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("readme.md"), "# hi").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "some notes here").unwrap();

        let result = tool.execute(serde_json::json!({})).await.unwrap();

        assert!(result.success);
        assert!(result.output.contains("src/"));
        assert!(result.output.contains("readme.md"));
        assert!(result.output.contains("notes.txt"));
        assert!(result.output.contains("Total: 1 directories, 2 files"));
        // Directories listed before files.
        let dir_pos = result.output.find("src/").unwrap();
        let file_pos = result.output.find("notes.txt").unwrap();
        assert!(dir_pos < file_pos);
    }

    #[tokio::test]
    async fn empty_directory() {
        let (_dir, tool) = setup();
        let result = tool
            .execute(serde_json::json!({"directory": "."}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("is empty"));
    }

    #[tokio::test]
    async fn subdirectory_listing() {
        let (dir, tool) = setup();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/guide.md"), "guide").unwrap();

        let result = tool
            .execute(serde_json::json!({"directory": "docs"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("guide.md"));
    }

    #[tokio::test]
    async fn nonexistent_directory() {
        let (_dir, tool) = setup();
        let result = tool
            .execute(serde_json::json!({"directory": "nope"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("does not exist"));
    }

    #[tokio::test]
    async fn escape_rejected() {
        let (_dir, tool) = setup();
        let err = tool
            .execute(serde_json::json!({"directory": "/etc"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }
}
