//! System prompt assembly.
//!
//! The prompt is rebuilt at the start of every run from the loop's
//! `SystemContext` snapshot and the tool catalog, so a new loop instance is
//! all it takes to pick up a changed working directory.

use deskclaw_core::context::SystemContext;
use deskclaw_core::transport::ToolSpec;

/// Build the system prompt for one run.
///
/// `guidance` carries extra policy lines from the caller, e.g. the sandbox's
/// allowed formats and size limit.
pub fn build_system_prompt(
    context: &SystemContext,
    tools: &[ToolSpec],
    guidance: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "You are a desktop assistant that helps the user work with the files in their workspace.\n\n",
    );

    prompt.push_str(&format!(
        "System context:\n\
         - Working directory: {}\n\
         - Operating system: {} {}\n\
         - Runtime version: {}\n\n",
        context.working_directory.display(),
        context.os_type,
        context.os_version,
        context.runtime_version,
    ));

    if !tools.is_empty() {
        prompt.push_str("You can use the following tools:\n\n");
        for (i, tool) in tools.iter().enumerate() {
            prompt.push_str(&format!("{}. {} - {}\n", i + 1, tool.name, tool.description));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Tool usage rules:\n\
         - All file paths are relative to the working directory\n\
         - Only files inside the working directory can be accessed\n",
    );
    if let Some(extra) = guidance {
        prompt.push_str(extra);
        if !extra.ends_with('\n') {
            prompt.push('\n');
        }
    }
    prompt.push_str(
        "- Use list_files to inspect a directory before operating on its files\n\
         - Read a file before modifying it\n\n\
         Use these tools whenever the request involves files; otherwise answer directly.",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "read_file".into(),
                description: "Read the full contents of a file".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
            ToolSpec {
                name: "list_files".into(),
                description: "List a directory".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
        ]
    }

    #[test]
    fn prompt_includes_context_and_catalog() {
        let ctx = SystemContext::new("/home/user/project", "linux", "Linux 6.1", "0.1.0");
        let prompt = build_system_prompt(&ctx, &specs(), None);

        assert!(prompt.contains("/home/user/project"));
        assert!(prompt.contains("linux Linux 6.1"));
        assert!(prompt.contains("1. read_file"));
        assert!(prompt.contains("2. list_files"));
        assert!(prompt.contains("relative to the working directory"));
    }

    #[test]
    fn guidance_lines_are_appended() {
        let ctx = SystemContext::new("/tmp", "linux", "Linux", "0.1.0");
        let prompt = build_system_prompt(&ctx, &[], Some("- Supported file formats: .txt, .md"));
        assert!(prompt.contains("Supported file formats"));
        assert!(prompt.contains("answer directly"));
    }
}
