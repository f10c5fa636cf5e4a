//! Interactive chat — the terminal consumer of the agent runtime.
//!
//! Builds the whole stack from config (sandbox → tools → transport → loop →
//! runner), renders sink events as they arrive, and reads user messages
//! from stdin. Ctrl-C cancels the in-flight run, not the session.

use anyhow::{Context, bail};
use deskclaw_agent::{AgentEvent, AgentLoop, ChannelSink, RunnerConfig, TaskRunner};
use deskclaw_config::AppConfig;
use deskclaw_core::context::SystemContext;
use deskclaw_core::error::AgentError;
use deskclaw_core::sink::EventSink;
use deskclaw_memory::ConversationMemory;
use deskclaw_tools::{Sandbox, sandbox_registry};
use deskclaw_transport::OpenAiCompatTransport;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: &Path,
    message: Option<String>,
    workdir: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing::debug!(path = %config_path.display(), "Loading configuration");
    let mut config = AppConfig::load_or_default(config_path)?;
    if let Some(dir) = workdir {
        config.sandbox.working_directory = dir;
    }

    let Some(api_key) = config.model.api_key.clone() else {
        bail!(
            "No API key configured. Set DESKCLAW_API_KEY or add model.api_key to {}",
            config_path.display()
        );
    };

    let sandbox = Arc::new(
        Sandbox::new(
            &config.sandbox.working_directory,
            config.sandbox.allowed_formats.clone(),
            config.sandbox.max_file_size,
        )
        .with_context(|| {
            format!(
                "Cannot open working directory {}",
                config.sandbox.working_directory.display()
            )
        })?,
    );

    let transport = Arc::new(OpenAiCompatTransport::new(
        "openai_compat",
        &config.model.api_base,
        api_key,
        Duration::from_secs(config.model.request_timeout_secs),
    ));

    let context = SystemContext::detect(sandbox.root());
    let (sink, mut events) = ChannelSink::new(256);
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    let agent = Arc::new(
        AgentLoop::new(
            transport,
            &config.model.model,
            config.model.temperature,
            Arc::new(sandbox_registry(sandbox.clone())),
            context,
            sink.clone(),
        )
        .with_max_iterations(config.agent.max_iterations)
        .with_max_tokens(config.model.max_tokens)
        .with_guidance(sandbox.rules_text()),
    );

    let runner = Arc::new(TaskRunner::new(
        agent,
        sink,
        RunnerConfig {
            max_attempts: config.retry.max_attempts,
            base_delay: Duration::from_secs(config.retry.base_delay_secs),
        },
    ));

    // Ctrl-C cancels the active run; the REPL itself keeps going.
    {
        let runner = runner.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                runner.cancel();
            }
        });
    }

    // Render sink events as they arrive.
    let render = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::Token { text } => {
                    let _ = write!(stdout, "{text}");
                    let _ = stdout.flush();
                }
                AgentEvent::ToolStart { name, input } => {
                    let _ = writeln!(stdout, "\n[{name}] {input}");
                }
                AgentEvent::ToolEnd { name, output } => {
                    let first_line = output.lines().next().unwrap_or("");
                    let _ = writeln!(stdout, "[{name}] {first_line}");
                }
                AgentEvent::FatalError { message } => {
                    let _ = writeln!(stdout, "\nerror: {message}");
                }
            }
        }
    });

    let mut memory = ConversationMemory::new();

    if let Some(message) = message {
        memory = send(&runner, memory, message).await;
    } else {
        println!("DeskClaw — working in {}", sandbox.root().display());
        println!("Type a message, /clear to reset the session, /quit to exit.\n");

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        print_prompt();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                print_prompt();
                continue;
            }
            match line.as_str() {
                "/quit" | "/exit" | "exit" | "quit" => break,
                "/clear" => {
                    memory.clear();
                    println!("Session cleared.");
                }
                _ => {
                    memory = send(&runner, memory, line).await;
                }
            }
            print_prompt();
        }
    }

    // The ctrl-c watcher keeps a runner clone alive, so the event channel
    // never closes on its own; stop the renderer explicitly.
    render.abort();
    let _ = render.await;
    Ok(())
}

/// Submit one message and wait for the run to finish, keeping the memory.
async fn send(
    runner: &TaskRunner,
    memory: ConversationMemory,
    message: String,
) -> ConversationMemory {
    let handle = runner.submit(memory, message);
    match handle.join().await {
        Ok(outcome) => {
            match &outcome.result {
                Ok(_) => println!(),
                Err(AgentError::Cancelled) => println!("\n(cancelled)"),
                // Fatal errors were already rendered via the sink.
                Err(_) => {}
            }
            outcome.memory
        }
        Err(e) => {
            eprintln!("run task failed: {e}");
            ConversationMemory::new()
        }
    }
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
