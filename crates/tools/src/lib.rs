//! Built-in sandboxed file tools for DeskClaw.
//!
//! Four capability-scoped operations, all confined to the sandbox root:
//! read, write (create-or-truncate), modify (verbatim substring
//! replacement), and list. Validation (containment, format, size) happens
//! before any filesystem access, so a rejected call has no side effects.

pub mod file_list;
pub mod file_modify;
pub mod file_read;
pub mod file_write;
pub mod sandbox;

pub use sandbox::{DEFAULT_ALLOWED_FORMATS, DEFAULT_MAX_FILE_SIZE, Sandbox};

use deskclaw_core::tool::ToolRegistry;
use std::sync::Arc;

/// Create the registry of file tools bound to one sandbox.
pub fn sandbox_registry(sandbox: Arc<Sandbox>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(file_read::ReadFileTool::new(sandbox.clone())));
    registry.register(Box::new(file_write::WriteFileTool::new(sandbox.clone())));
    registry.register(Box::new(file_modify::ModifyFileTool::new(sandbox.clone())));
    registry.register(Box::new(file_list::ListFilesTool::new(sandbox)));
    registry
}
