//! Streaming event sink — how the loop reports progress to a consumer.
//!
//! A narrow callback interface: tokens, tool-call lifecycle, and the
//! runner's single terminal failure. The loop guarantees delivery order
//! matches production order and never reorders, drops, or coalesces.
//! Implementations that cross a thread boundary (e.g., to a UI) do their
//! own queuing; the loop only requires that each call returns.

/// Callbacks invoked by the agent loop and task runner as a run progresses.
pub trait EventSink: Send + Sync {
    /// A text token arrived from the model. Called before any buffering
    /// for parsing — consumers see tokens at generation latency.
    fn on_token(&self, text: &str);

    /// The model requested a tool call; emitted synchronously before the
    /// tool executes.
    fn on_tool_start(&self, name: &str, input: &serde_json::Value);

    /// A tool call finished (successfully or with a tool-level error).
    fn on_tool_end(&self, name: &str, output: &str);

    /// All retry attempts were exhausted. Emitted exactly once, by the
    /// task runner only — the loop itself never calls this.
    fn on_fatal_error(&self, message: &str);
}

/// A sink that discards all events. Useful as a default and in tests.
pub struct NullSink;

impl EventSink for NullSink {
    fn on_token(&self, _text: &str) {}
    fn on_tool_start(&self, _name: &str, _input: &serde_json::Value) {}
    fn on_tool_end(&self, _name: &str, _output: &str) {}
    fn on_fatal_error(&self, _message: &str) {}
}
