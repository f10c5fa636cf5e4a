//! ModelTransport trait — the abstraction over the remote model service.
//!
//! A transport knows how to send an assembled conversation to the model and
//! stream the response back token by token. The agent loop calls
//! `stream_chat` without knowing which backend is configured.

use crate::error::TransportError;
use crate::message::{Message, ToolCallRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One model call, fully assembled by the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportRequest {
    /// The model to use (e.g., "gpt-4o", "anthropic/claude-sonnet-4")
    pub model: String,

    /// System instructions (context + tool usage rules)
    pub system: String,

    /// The conversation messages, oldest first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A single chunk in a streaming response.
///
/// Text deltas arrive incrementally; tool-call deltas carry argument
/// fragments that the consumer merges by call id. The final chunk has
/// `done: true` and usually carries usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Partial tool call deltas
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core ModelTransport trait.
///
/// Auth, base URL, and model selection are construction-time configuration
/// of the implementor — never renegotiated mid-run.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// A human-readable name for this transport (e.g., "openai_compat").
    fn name(&self) -> &str;

    /// Send a request and stream back response chunks.
    ///
    /// The receiver yields text and tool-call deltas in generation order
    /// and closes after the `done` chunk (or an error).
    async fn stream_chat(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, TransportError>>,
        TransportError,
    >;

    /// List models available at this endpoint.
    async fn list_models(&self) -> std::result::Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    /// Health check — can we reach the service?
    async fn health_check(&self) -> std::result::Result<bool, TransportError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_spec_serialization() {
        let spec = ToolSpec {
            name: "read_file".into(),
            description: "Read the contents of a file".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "The file to read" }
                },
                "required": ["file_path"]
            }),
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("read_file"));
        assert!(json.contains("file_path"));
    }

    #[test]
    fn stream_chunk_defaults() {
        let chunk = StreamChunk::default();
        assert!(chunk.content.is_none());
        assert!(chunk.tool_calls.is_empty());
        assert!(!chunk.done);
    }
}
