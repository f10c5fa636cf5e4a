//! Model transport implementations for DeskClaw.
//!
//! The agent loop talks to an abstract [`deskclaw_core::ModelTransport`];
//! this crate provides the OpenAI-compatible HTTP/SSE implementation that
//! covers the vast majority of hosted and local endpoints.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatTransport;
