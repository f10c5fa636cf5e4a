//! System context — the per-loop snapshot of the host environment.
//!
//! Captured once at loop construction and injected into the model prompt.
//! Changing the working directory means building a new loop instance; a
//! running loop never observes the change.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A read-only snapshot of the environment the agent operates in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemContext {
    /// Absolute path of the sandbox root / working directory
    pub working_directory: PathBuf,

    /// Operating system family (e.g., "linux", "macos", "windows")
    pub os_type: String,

    /// Operating system release, best effort
    pub os_version: String,

    /// Version of this runtime
    pub runtime_version: String,
}

impl SystemContext {
    /// Build a context for the given working directory, probing the host
    /// for OS information.
    pub fn detect(working_directory: impl AsRef<Path>) -> Self {
        Self {
            working_directory: absolute(working_directory.as_ref()),
            os_type: std::env::consts::OS.to_string(),
            os_version: os_release(),
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Build a context with explicit values (tests, replays).
    pub fn new(
        working_directory: impl Into<PathBuf>,
        os_type: impl Into<String>,
        os_version: impl Into<String>,
        runtime_version: impl Into<String>,
    ) -> Self {
        Self {
            working_directory: absolute(&working_directory.into()),
            os_type: os_type.into(),
            os_version: os_version.into(),
            runtime_version: runtime_version.into(),
        }
    }

    /// Derive a new context rooted at a different directory. The snapshot
    /// semantics live with the caller: existing loops keep the old copy.
    pub fn with_working_directory(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: absolute(&dir.into()),
            ..self.clone()
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// OS release string, best effort per platform.
fn os_release() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(release) = std::fs::read_to_string("/proc/sys/kernel/osrelease") {
            return format!("Linux {}", release.trim());
        }
    }
    std::env::consts::OS.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_fills_all_fields() {
        let ctx = SystemContext::detect(".");
        assert!(ctx.working_directory.is_absolute());
        assert!(!ctx.os_type.is_empty());
        assert!(!ctx.os_version.is_empty());
        assert!(!ctx.runtime_version.is_empty());
    }

    #[test]
    fn with_working_directory_leaves_original_untouched() {
        let ctx = SystemContext::new("/tmp/a", "linux", "Linux 6.1", "0.1.0");
        let moved = ctx.with_working_directory("/tmp/b");
        assert_eq!(ctx.working_directory, PathBuf::from("/tmp/a"));
        assert_eq!(moved.working_directory, PathBuf::from("/tmp/b"));
        assert_eq!(moved.os_type, "linux");
    }
}
