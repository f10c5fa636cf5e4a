//! The agent execution loop implementation.
//!
//! State machine: `Composing → AwaitingModel → ParsingResponse →
//! {ExecutingTool → AwaitingModel} | Done | Failed`. Suspension happens only
//! while streaming the model call and while a tool touches the filesystem;
//! the cancellation token is checked at every transition and between stream
//! chunks.

use crate::prompts;
use deskclaw_core::context::SystemContext;
use deskclaw_core::error::{AgentError, TransportError};
use deskclaw_core::message::{Role, ToolCallRequest};
use deskclaw_core::sink::EventSink;
use deskclaw_core::tool::{ToolInvocation, ToolRegistry};
use deskclaw_core::transport::{ModelTransport, TransportRequest};
use deskclaw_memory::ConversationMemory;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The outcome of one successful run.
#[derive(Debug, Clone)]
pub struct LoopResult {
    /// The model's final answer (or the synthesized text when the
    /// iteration limit forced completion).
    pub final_text: String,

    /// Every tool invocation the run performed, in execution order.
    pub tool_trace: Vec<ToolInvocation>,

    /// Number of tool-call round-trips executed. A run that answers
    /// directly has an iteration count of zero.
    pub iteration_count: u32,
}

/// The core loop that orchestrates model calls and tool execution.
///
/// Configuration is immutable after construction: a changed working
/// directory, tool set, or transport means building a new instance.
pub struct AgentLoop {
    /// The model transport to use
    transport: Arc<dyn ModelTransport>,

    /// The model to request
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Environment snapshot injected into the prompt
    context: SystemContext,

    /// Extra policy lines for the system prompt (sandbox rules)
    guidance: Option<String>,

    /// Maximum tool-call round-trips per run
    max_iterations: u32,

    /// Event sink for tokens and tool lifecycle events
    sink: Arc<dyn EventSink>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        context: SystemContext,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            context,
            guidance: None,
            max_iterations: 10,
            sink,
        }
    }

    /// Set the maximum number of tool-call round-trips.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Append extra policy lines to the system prompt.
    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    /// Process one user message against the lent conversation memory.
    ///
    /// Appends the user message, then drives model calls and tool execution
    /// until the model produces a final answer, the iteration limit forces
    /// one, a transport error aborts the run, or `cancel` fires. Memory is
    /// only ever appended to; cancellation leaves whatever was appended in
    /// place.
    pub async fn run(
        &self,
        memory: &mut ConversationMemory,
        user_input: &str,
        cancel: &CancellationToken,
    ) -> Result<LoopResult, AgentError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, history = memory.len(), "Processing user message");

        let tool_specs = self.tools.specs();
        let system_prompt =
            prompts::build_system_prompt(&self.context, &tool_specs, self.guidance.as_deref());

        memory.append(Role::User, user_input);

        let mut tool_trace: Vec<ToolInvocation> = Vec::new();
        let mut tool_rounds = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            debug!(%run_id, round = tool_rounds, "Requesting model completion");

            // Composing: the request snapshot for this turn.
            let request = TransportRequest {
                model: self.model.clone(),
                system: system_prompt.clone(),
                messages: memory.history().to_vec(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_specs.clone(),
            };

            // AwaitingModel: stream the response, forwarding each token to
            // the sink before it is buffered for parsing.
            let mut rx = self.transport.stream_chat(request).await?;

            let mut content = String::new();
            let mut tool_calls: Vec<ToolCallRequest> = Vec::new();

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(%run_id, "Cancelled while streaming");
                        return Err(AgentError::Cancelled);
                    }
                    chunk = rx.recv() => {
                        let Some(chunk) = chunk else { break };
                        let chunk = chunk?;

                        if let Some(text) = &chunk.content
                            && !text.is_empty()
                        {
                            self.sink.on_token(text);
                            content.push_str(text);
                        }

                        // Merge tool-call deltas by call id.
                        for tc in &chunk.tool_calls {
                            if let Some(existing) =
                                tool_calls.iter_mut().find(|t| t.id == tc.id)
                            {
                                existing.arguments.push_str(&tc.arguments);
                            } else {
                                tool_calls.push(tc.clone());
                            }
                        }

                        if chunk.done {
                            break;
                        }
                    }
                }
            }

            // ParsingResponse: no suspension here.
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            if content.is_empty() && tool_calls.is_empty() {
                return Err(AgentError::Transport(TransportError::MalformedResponse(
                    "model returned an empty response".into(),
                )));
            }

            if tool_calls.is_empty() {
                // Done: no tool request, the accumulated text is the answer.
                memory.append(Role::Assistant, &content);
                info!(%run_id, rounds = tool_rounds, "Run completed");
                return Ok(LoopResult {
                    final_text: content,
                    tool_trace,
                    iteration_count: tool_rounds,
                });
            }

            // Tie-break: a response carrying both text and tool calls is a
            // tool call; the text rides along as the assistant's thought.
            tool_rounds += 1;
            debug!(%run_id, count = tool_calls.len(), "Executing tool calls");
            memory.append_assistant_calls(&content, tool_calls.clone());

            // ExecutingTool
            for tc in &tool_calls {
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }

                let arguments: serde_json::Value =
                    serde_json::from_str(&tc.arguments).unwrap_or_default();

                self.sink.on_tool_start(&tc.name, &arguments);

                let result = self.tools.execute(&tc.name, arguments.clone()).await;
                let (output, success, resolved_path) = match result {
                    Ok(out) => (out.output, out.success, out.resolved_path),
                    Err(e) => {
                        warn!(%run_id, tool = %tc.name, error = %e, "Tool call failed");
                        (format!("Error: {e}"), false, None)
                    }
                };

                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                self.sink.on_tool_end(&tc.name, &output);

                tool_trace.push(ToolInvocation {
                    tool_name: tc.name.clone(),
                    arguments,
                    resolved_path,
                    outcome: output.clone(),
                    success,
                });

                memory.append_tool_result(&tc.id, &output);
            }

            if tool_rounds >= self.max_iterations {
                // Forced Done: never loop indefinitely.
                warn!(%run_id, rounds = tool_rounds, "Iteration limit reached, forcing completion");
                let final_text = format!(
                    "I've reached the limit of {} tool calls for this request. \
                     Tell me how you'd like to continue and I'll pick up from here.",
                    self.max_iterations
                );
                memory.append(Role::Assistant, &final_text);
                return Ok(LoopResult {
                    final_text,
                    tool_trace,
                    iteration_count: tool_rounds,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        RecordingSink, ScriptedResponse, ScriptedTransport, SinkEvent, tool_call,
    };
    use deskclaw_core::sink::NullSink;

    fn test_context() -> SystemContext {
        SystemContext::new("/tmp/workspace", "linux", "Linux 6.1", "0.1.0")
    }

    fn simple_loop(transport: ScriptedTransport, sink: Arc<dyn EventSink>) -> AgentLoop {
        AgentLoop::new(
            Arc::new(transport),
            "mock-model",
            0.7,
            Arc::new(ToolRegistry::new()),
            test_context(),
            sink,
        )
    }

    #[tokio::test]
    async fn simple_text_response() {
        let agent = simple_loop(
            ScriptedTransport::single_text("Hello! How can I help?"),
            Arc::new(NullSink),
        );
        let mut memory = ConversationMemory::new();
        let cancel = CancellationToken::new();

        let result = agent.run(&mut memory, "Hello!", &cancel).await.unwrap();

        assert_eq!(result.final_text, "Hello! How can I help?");
        assert_eq!(result.iteration_count, 0);
        assert!(result.tool_trace.is_empty());
        // User + Assistant
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.history()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn tokens_are_streamed_before_completion() {
        let sink = Arc::new(RecordingSink::new());
        let agent = simple_loop(
            ScriptedTransport::single_text("one two three"),
            sink.clone(),
        );
        let mut memory = ConversationMemory::new();

        agent
            .run(&mut memory, "count", &CancellationToken::new())
            .await
            .unwrap();

        let tokens: Vec<String> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Token(t) => Some(t),
                _ => None,
            })
            .collect();
        assert!(tokens.len() > 1, "expected multiple token events, got {tokens:?}");
        assert_eq!(tokens.concat(), "one two three");
    }

    #[tokio::test]
    async fn unknown_tool_error_is_folded_back() {
        let transport = ScriptedTransport::new(vec![
            ScriptedResponse::tool_calls(vec![tool_call(
                "call_1",
                "no_such_tool",
                serde_json::json!({}),
            )]),
            ScriptedResponse::text("Sorry about that."),
        ]);
        let sink = Arc::new(RecordingSink::new());
        let agent = simple_loop(transport, sink.clone());
        let mut memory = ConversationMemory::new();

        let result = agent
            .run(&mut memory, "use a tool", &CancellationToken::new())
            .await
            .unwrap();

        // The tool failure did not abort the run.
        assert_eq!(result.final_text, "Sorry about that.");
        assert_eq!(result.iteration_count, 1);
        assert_eq!(result.tool_trace.len(), 1);
        assert!(!result.tool_trace[0].success);
        assert!(result.tool_trace[0].outcome.contains("not found"));

        // The error text went back into the conversation as a tool message.
        let tool_msg = memory
            .history()
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.contains("not found"));
    }

    #[tokio::test]
    async fn tie_break_prefers_tool_calls() {
        // A malformed turn that carries both answer-looking text and a tool
        // call is treated as a tool call.
        let transport = ScriptedTransport::new(vec![
            ScriptedResponse::tool_calls_with_text(
                "Here is your answer: 42",
                vec![tool_call("call_1", "no_such_tool", serde_json::json!({}))],
            ),
            ScriptedResponse::text("Final answer"),
        ]);
        let agent = simple_loop(transport, Arc::new(NullSink));
        let mut memory = ConversationMemory::new();

        let result = agent
            .run(&mut memory, "ambiguous", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.final_text, "Final answer");
        assert_eq!(result.iteration_count, 1);
        // The preamble text was kept on the assistant message, not lost.
        let assistant = &memory.history()[1];
        assert_eq!(assistant.content, "Here is your answer: 42");
        assert_eq!(assistant.tool_calls.len(), 1);
    }

    #[tokio::test]
    async fn empty_response_is_malformed() {
        let agent = simple_loop(ScriptedTransport::single_text(""), Arc::new(NullSink));
        let mut memory = ConversationMemory::new();

        let err = agent
            .run(&mut memory, "hi", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AgentError::Transport(TransportError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn iteration_limit_forces_completion() {
        let transport = ScriptedTransport::always_tool_calling(tool_call(
            "call_loop",
            "no_such_tool",
            serde_json::json!({}),
        ));
        let agent = simple_loop(transport, Arc::new(NullSink)).with_max_iterations(3);
        let mut memory = ConversationMemory::new();

        let result = agent
            .run(&mut memory, "loop forever", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.iteration_count, 3);
        assert!(!result.final_text.is_empty());
        assert!(result.final_text.contains("limit"));
        // The synthesized answer was appended to memory.
        assert_eq!(memory.history().last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn pre_cancelled_run_does_nothing_visible() {
        let sink = Arc::new(RecordingSink::new());
        let agent = simple_loop(ScriptedTransport::single_text("never seen"), sink.clone());
        let mut memory = ConversationMemory::new();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agent.run(&mut memory, "hello", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(sink.events().is_empty());
    }
}
