//! Agent-level streaming events.
//!
//! [`AgentEvent`] is the serializable mirror of the [`EventSink`] callbacks,
//! for consumers on another task or thread (a UI, a logger, a test harness).
//! [`ChannelSink`] forwards events into a bounded mpsc channel; cross-thread
//! queuing belongs to the sink implementation, never to the loop.

use deskclaw_core::sink::EventSink;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Events emitted while a run progresses.
///
/// - `token`       — partial text from the model
/// - `tool_start`  — the agent is invoking a tool
/// - `tool_end`    — tool execution completed
/// - `fatal_error` — all retry attempts exhausted (runner-level, terminal)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Partial text token from the model.
    Token { text: String },

    /// The agent is calling a tool.
    ToolStart {
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed (output or folded error text).
    ToolEnd { name: String, output: String },

    /// The run failed for good; carries the last underlying cause.
    FatalError { message: String },
}

impl AgentEvent {
    /// Wire-level event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolEnd { .. } => "tool_end",
            Self::FatalError { .. } => "fatal_error",
        }
    }
}

/// An [`EventSink`] that forwards events into a bounded channel.
///
/// The loop only requires sink calls to return; this sink never blocks it.
/// If the consumer falls behind and the channel fills up, events are dropped
/// with a warning — sizing the channel for the consumer's pace is the
/// consumer's responsibility.
pub struct ChannelSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the consumer drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn forward(&self, event: AgentEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("Event sink channel full or closed, dropping event: {e}");
        }
    }
}

impl EventSink for ChannelSink {
    fn on_token(&self, text: &str) {
        self.forward(AgentEvent::Token { text: text.into() });
    }

    fn on_tool_start(&self, name: &str, input: &serde_json::Value) {
        self.forward(AgentEvent::ToolStart {
            name: name.into(),
            input: input.clone(),
        });
    }

    fn on_tool_end(&self, name: &str, output: &str) {
        self.forward(AgentEvent::ToolEnd {
            name: name.into(),
            output: output.into(),
        });
    }

    fn on_fatal_error(&self, message: &str) {
        self.forward(AgentEvent::FatalError {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_token() {
        let event = AgentEvent::Token { text: "Hello".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"token""#));
        assert!(json.contains(r#""text":"Hello""#));
    }

    #[test]
    fn event_serialization_tool_start() {
        let event = AgentEvent::ToolStart {
            name: "read_file".into(),
            input: serde_json::json!({"file_path": "a.txt"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_start""#));
        assert!(json.contains(r#""name":"read_file""#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AgentEvent::Token { text: "x".into() }.event_type(), "token");
        assert_eq!(
            AgentEvent::FatalError { message: "x".into() }.event_type(),
            "fatal_error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"tool_end","name":"list_files","output":"done"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::ToolEnd { name, output } => {
                assert_eq!(name, "list_files");
                assert_eq!(output, "done");
            }
            other => panic!("Wrong variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new(16);
        sink.on_token("a");
        sink.on_tool_start("list_files", &serde_json::json!({}));
        sink.on_tool_end("list_files", "ok");

        assert!(matches!(rx.recv().await, Some(AgentEvent::Token { .. })));
        assert!(matches!(rx.recv().await, Some(AgentEvent::ToolStart { .. })));
        assert!(matches!(rx.recv().await, Some(AgentEvent::ToolEnd { .. })));
    }
}
