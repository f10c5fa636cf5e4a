//! Filesystem sandboxing — every tool operation stays under one root.
//!
//! Three checks run, in order, before any filesystem access:
//! 1. path containment (no `..` traversal, no absolute-path or symlink
//!    escape),
//! 2. extension allow-list,
//! 3. byte-size limit (file size for reads, payload size for writes).

use deskclaw_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Default extension allow-list for file tools.
pub const DEFAULT_ALLOWED_FORMATS: &[&str] = &[
    ".txt", ".md", ".py", ".js", ".json", ".yaml", ".yml", ".html", ".css", ".xml", ".csv",
    ".log", ".sh", ".bat", ".rs", ".toml",
];

/// Default per-file byte limit (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// The directory boundary outside of which no tool may read or write.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    allowed_formats: Vec<String>,
    max_file_size: u64,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`. The root must exist; it is
    /// canonicalized so symlink tricks cannot move the boundary.
    pub fn new(
        root: impl AsRef<Path>,
        allowed_formats: Vec<String>,
        max_file_size: u64,
    ) -> std::io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        let allowed_formats = allowed_formats
            .into_iter()
            .map(|f| {
                let f = f.to_lowercase();
                if f.starts_with('.') { f } else { format!(".{f}") }
            })
            .collect();
        Ok(Self {
            root,
            allowed_formats,
            max_file_size,
        })
    }

    /// Create a sandbox with the default format list and size limit.
    pub fn with_defaults(root: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::new(
            root,
            DEFAULT_ALLOWED_FORMATS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_MAX_FILE_SIZE,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn allowed_formats(&self) -> &[String] {
        &self.allowed_formats
    }

    /// Resolve a requested path against the root and verify containment.
    ///
    /// Relative paths are taken relative to the root. The existing part of
    /// the path is canonicalized so a symlink inside the sandbox cannot
    /// point the operation outside it. Returns the absolute resolved path.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ToolError> {
        let escape = || ToolError::PathEscape {
            path: requested.to_string(),
        };

        let joined = {
            let p = Path::new(requested);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                self.root.join(p)
            }
        };

        // Lexical normalization: fold `.` and `..` without touching the fs.
        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(escape());
                    }
                }
                other => normalized.push(other.as_os_str()),
            }
        }

        // Canonicalize the deepest existing ancestor so symlinks resolve,
        // then re-attach the not-yet-existing remainder (for writes).
        let resolved = canonicalize_prefix(&normalized);

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(escape())
        }
    }

    /// Verify the file extension is on the allow-list.
    pub fn check_format(&self, requested: &str) -> Result<(), ToolError> {
        let extension = Path::new(requested)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        if extension.is_empty() || !self.allowed_formats.contains(&extension) {
            return Err(ToolError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".into()
                } else {
                    extension
                },
                allowed: self.allowed_formats.join(", "),
            });
        }
        Ok(())
    }

    /// Verify a byte count (file size or write payload) is within the limit.
    pub fn check_size(&self, size: u64) -> Result<(), ToolError> {
        if size > self.max_file_size {
            return Err(ToolError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Policy lines for the model's system prompt.
    pub fn rules_text(&self) -> String {
        format!(
            "- Supported file formats: {}\n- Single file size limit: {}",
            self.allowed_formats.join(", "),
            human_size(self.max_file_size)
        )
    }

    /// Render a resolved path relative to the root for tool output.
    pub fn display_path(&self, resolved: &Path) -> String {
        resolved
            .strip_prefix(&self.root)
            .map(|rel| {
                if rel.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    rel.to_string_lossy().into_owned()
                }
            })
            .unwrap_or_else(|_| resolved.to_string_lossy().into_owned())
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-join the
/// remaining components.
fn canonicalize_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut remainder: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        if existing.exists() {
            break;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }

    let mut resolved = existing.canonicalize().unwrap_or_else(|_| existing.to_path_buf());
    for name in remainder.into_iter().rev() {
        resolved.push(name);
    }
    resolved
}

/// Format a byte count the way directory listings show it.
pub(crate) fn human_size(size: u64) -> String {
    if size < 1024 {
        format!("{size}B")
    } else if size < 1024 * 1024 {
        format!("{:.1}KB", size as f64 / 1024.0)
    } else {
        format!("{:.1}MB", size as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sb = Sandbox::with_defaults(dir.path()).unwrap();
        (dir, sb)
    }

    #[test]
    fn relative_path_resolves_under_root() {
        let (_dir, sb) = sandbox();
        let resolved = sb.resolve("notes/todo.txt").unwrap();
        assert!(resolved.starts_with(sb.root()));
        assert!(resolved.ends_with("notes/todo.txt"));
    }

    #[test]
    fn dot_resolves_to_root() {
        let (_dir, sb) = sandbox();
        assert_eq!(sb.resolve(".").unwrap(), sb.root());
    }

    #[test]
    fn parent_traversal_rejected() {
        let (_dir, sb) = sandbox();
        let err = sb.resolve("../../../etc/passwd").unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }

    #[test]
    fn interior_traversal_that_escapes_rejected() {
        let (_dir, sb) = sandbox();
        let err = sb.resolve("notes/../../outside.txt").unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }

    #[test]
    fn interior_traversal_that_stays_inside_allowed() {
        let (_dir, sb) = sandbox();
        let resolved = sb.resolve("notes/../todo.txt").unwrap();
        assert_eq!(resolved, sb.root().join("todo.txt"));
    }

    #[test]
    fn absolute_path_outside_root_rejected() {
        let (_dir, sb) = sandbox();
        let err = sb.resolve("/etc/passwd").unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }

    #[test]
    fn absolute_path_inside_root_allowed() {
        let (_dir, sb) = sandbox();
        let inside = sb.root().join("file.txt");
        let resolved = sb.resolve(inside.to_str().unwrap()).unwrap();
        assert_eq!(resolved, inside);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let (_dir, sb) = sandbox();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), sb.root().join("link")).unwrap();

        let err = sb.resolve("link/secret.txt").unwrap_err();
        assert!(matches!(err, ToolError::PathEscape { .. }));
    }

    #[test]
    fn format_allow_list_enforced() {
        let (_dir, sb) = sandbox();
        assert!(sb.check_format("notes.txt").is_ok());
        assert!(sb.check_format("src/main.RS").is_ok());
        let err = sb.check_format("binary.exe").unwrap_err();
        assert!(matches!(err, ToolError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_extension_rejected() {
        let (_dir, sb) = sandbox();
        let err = sb.check_format("Makefile").unwrap_err();
        match err {
            ToolError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "(none)"),
            other => panic!("Expected UnsupportedFormat, got: {other}"),
        }
    }

    #[test]
    fn size_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let sb = Sandbox::new(dir.path(), vec![".txt".into()], 100).unwrap();
        assert!(sb.check_size(100).is_ok());
        let err = sb.check_size(101).unwrap_err();
        assert!(matches!(err, ToolError::FileTooLarge { size: 101, limit: 100 }));
    }

    #[test]
    fn display_path_is_relative() {
        let (_dir, sb) = sandbox();
        let resolved = sb.resolve("a/b.txt").unwrap();
        assert_eq!(sb.display_path(&resolved), "a/b.txt");
        assert_eq!(sb.display_path(sb.root()), ".");
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(512), "512B");
        assert_eq!(human_size(2048), "2.0KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0MB");
    }
}
