//! The resilient task runner — retry and cancellation around one loop run.
//!
//! A run executes on its own tokio task, never the caller's. Transport
//! failures retry the *entire* run with linear backoff, starting each
//! attempt from the memory state that existed before the first one.
//! Cancellation is cooperative: the token is observed at the loop's state
//! transitions, nothing is emitted afterwards, and already-appended
//! messages stay (they are valid history, not garbage).

use crate::loop_runner::{AgentLoop, LoopResult};
use deskclaw_core::error::{AgentError, TransportError};
use deskclaw_core::sink::EventSink;
use deskclaw_memory::ConversationMemory;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Retry policy for the runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Total attempts, first try included.
    pub max_attempts: u32,

    /// Backoff unit: the wait before attempt `n + 1` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// What a finished run hands back to the session layer.
pub struct RunOutcome {
    /// The memory that was lent to the run, including everything the run
    /// appended (also on cancellation).
    pub memory: ConversationMemory,

    /// The run result. `AttemptsExhausted` and `Cancelled` are terminal.
    pub result: Result<LoopResult, AgentError>,
}

/// A handle to one in-flight run.
pub struct RunHandle {
    join: JoinHandle<RunOutcome>,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Request cooperative cancellation of this run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the run task has terminated.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to terminate and take back the memory.
    pub async fn join(self) -> std::result::Result<RunOutcome, tokio::task::JoinError> {
        self.join.await
    }
}

/// Runs one agent loop invocation per submission, off the caller's thread,
/// with bounded retry and a cancellation token per run.
///
/// The caller serializes submissions: a new user message while a run is
/// active means `cancel()`, await the old handle, then `submit()` again.
pub struct TaskRunner {
    agent: Arc<AgentLoop>,
    sink: Arc<dyn EventSink>,
    config: RunnerConfig,
    active: Mutex<Option<CancellationToken>>,
}

impl TaskRunner {
    pub fn new(agent: Arc<AgentLoop>, sink: Arc<dyn EventSink>, config: RunnerConfig) -> Self {
        Self {
            agent,
            sink,
            config,
            active: Mutex::new(None),
        }
    }

    /// Start a run for one user message. Takes ownership of the memory for
    /// the run's duration; it comes back through the handle.
    pub fn submit(&self, memory: ConversationMemory, user_input: impl Into<String>) -> RunHandle {
        let cancel = CancellationToken::new();
        *self.active.lock().unwrap() = Some(cancel.clone());

        let agent = self.agent.clone();
        let sink = self.sink.clone();
        let config = self.config.clone();
        let user_input = user_input.into();
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            run_with_retry(agent, sink, config, token, memory, user_input).await
        });

        RunHandle { join, cancel }
    }

    /// Cancel the most recently submitted run, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().unwrap().as_ref() {
            token.cancel();
        }
    }
}

async fn run_with_retry(
    agent: Arc<AgentLoop>,
    sink: Arc<dyn EventSink>,
    config: RunnerConfig,
    cancel: CancellationToken,
    mut memory: ConversationMemory,
    user_input: String,
) -> RunOutcome {
    // Every attempt starts from the state before the first one.
    let baseline = memory.snapshot();
    let max_attempts = config.max_attempts.max(1);
    let mut last_error: Option<TransportError> = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            memory.load_from(baseline.clone());

            let delay = config.base_delay * (attempt - 1);
            info!(attempt, delay_secs = delay.as_secs_f64(), "Retrying after backoff");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return RunOutcome {
                        memory,
                        result: Err(AgentError::Cancelled),
                    };
                }
            }
        }

        match agent.run(&mut memory, &user_input, &cancel).await {
            Ok(result) => {
                return RunOutcome {
                    memory,
                    result: Ok(result),
                };
            }
            Err(AgentError::Transport(e)) => {
                warn!(attempt, max_attempts, error = %e, "Run attempt failed");
                last_error = Some(e);
            }
            Err(other) => {
                // Cancelled and internal errors are terminal, not retried.
                return RunOutcome {
                    memory,
                    result: Err(other),
                };
            }
        }
    }

    let last = last_error.expect("at least one attempt must have failed");
    let message = format!("Request failed after {max_attempts} attempts: {last}");
    if !cancel.is_cancelled() {
        sink.on_fatal_error(&message);
    }

    RunOutcome {
        memory,
        result: Err(AgentError::AttemptsExhausted {
            attempts: max_attempts,
            last,
        }),
    }
}
