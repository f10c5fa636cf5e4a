//! # DeskClaw Core
//!
//! Domain types, traits, and error definitions for the DeskClaw agent
//! execution runtime. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod context;
pub mod error;
pub mod message;
pub mod sink;
pub mod tool;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use context::SystemContext;
pub use error::{AgentError, ConfigError, Result, ToolError, TransportError};
pub use message::{Message, Role, ToolCallRequest};
pub use sink::{EventSink, NullSink};
pub use tool::{Tool, ToolInvocation, ToolRegistry};
pub use transport::{ModelTransport, StreamChunk, ToolSpec, TransportRequest, Usage};
