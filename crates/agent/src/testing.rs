//! Scripted test doubles for the agent loop and task runner.
//!
//! `ScriptedTransport` plays back a fixed sequence of model turns —
//! streaming text token by token the way a real endpoint would — and
//! `RecordingSink` captures every sink event in order. Both are used by the
//! crate's own tests and are handy for driving a UI without network access.

use async_trait::async_trait;
use deskclaw_core::error::TransportError;
use deskclaw_core::message::ToolCallRequest;
use deskclaw_core::sink::EventSink;
use deskclaw_core::transport::{ModelTransport, StreamChunk, TransportRequest};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
    token_delay: Option<Duration>,
    error: Option<TransportError>,
}

impl ScriptedResponse {
    /// A plain text answer, streamed word by word.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            token_delay: None,
            error: None,
        }
    }

    /// A turn that requests tool calls with no preamble text.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self::tool_calls_with_text("", calls)
    }

    /// A turn that carries both text and tool calls (the ambiguous case).
    pub fn tool_calls_with_text(text: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: text.into(),
            tool_calls: calls,
            token_delay: None,
            error: None,
        }
    }

    /// A transport-level failure raised before any chunk is produced.
    pub fn error(error: TransportError) -> Self {
        Self {
            text: String::new(),
            tool_calls: Vec::new(),
            token_delay: None,
            error: Some(error),
        }
    }

    /// Stream tokens with a pause between them, for cancellation tests.
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }
}

/// A mock transport that returns scripted responses in order.
///
/// Panics if more calls are made than responses were scripted, unless a
/// repeating response is configured.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    repeat: Option<ScriptedResponse>,
    call_count: AtomicU32,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// A transport that returns a single text answer.
    pub fn single_text(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedResponse::text(text)])
    }

    /// First requests the given tool calls, then answers with text.
    pub fn tool_then_answer(calls: Vec<ToolCallRequest>, answer: impl Into<String>) -> Self {
        Self::new(vec![
            ScriptedResponse::tool_calls(calls),
            ScriptedResponse::text(answer),
        ])
    }

    /// Fails every call with a clone of the given error.
    pub fn always_failing(error: TransportError) -> Self {
        Self::repeating(ScriptedResponse::error(error))
    }

    /// Requests the same tool call on every turn, forever.
    pub fn always_tool_calling(call: ToolCallRequest) -> Self {
        Self::repeating(ScriptedResponse::tool_calls(vec![call]))
    }

    /// Replays `response` once the scripted queue is exhausted.
    pub fn repeating(response: ScriptedResponse) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            call_count: AtomicU32::new(0),
        }
    }

    /// How many times `stream_chat` was invoked.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> ScriptedResponse {
        let mut queue = self.responses.lock().unwrap();
        match queue.pop_front().or_else(|| self.repeat.clone()) {
            Some(r) => r,
            None => panic!(
                "ScriptedTransport: no more responses (call #{})",
                self.call_count.load(Ordering::SeqCst)
            ),
        }
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(
        &self,
        _request: TransportRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, TransportError>>,
        TransportError,
    > {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();

        if let Some(error) = response.error {
            return Err(error);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for token in response.text.split_inclusive(' ') {
                if let Some(delay) = response.token_delay {
                    tokio::time::sleep(delay).await;
                }
                let chunk = StreamChunk {
                    content: Some(token.to_string()),
                    ..Default::default()
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }

            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    tool_calls: response.tool_calls,
                    done: true,
                    usage: None,
                }))
                .await;
        });

        Ok(rx)
    }
}

/// One recorded sink event.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Token(String),
    ToolStart { name: String, input: serde_json::Value },
    ToolEnd { name: String, output: String },
    Fatal(String),
}

/// An [`EventSink`] that records every event in delivery order.
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// The recorded events with tokens collapsed away, for order checks.
    pub fn non_token_events(&self) -> Vec<SinkEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, SinkEvent::Token(_)))
            .collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn on_token(&self, text: &str) {
        self.events.lock().unwrap().push(SinkEvent::Token(text.into()));
    }

    fn on_tool_start(&self, name: &str, input: &serde_json::Value) {
        self.events.lock().unwrap().push(SinkEvent::ToolStart {
            name: name.into(),
            input: input.clone(),
        });
    }

    fn on_tool_end(&self, name: &str, output: &str) {
        self.events.lock().unwrap().push(SinkEvent::ToolEnd {
            name: name.into(),
            output: output.into(),
        });
    }

    fn on_fatal_error(&self, message: &str) {
        self.events.lock().unwrap().push(SinkEvent::Fatal(message.into()));
    }
}

/// Helper to build a tool call request with JSON arguments.
pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
