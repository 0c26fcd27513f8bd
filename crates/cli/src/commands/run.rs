//! `stepwise run` — Work a single request with the agent.

use std::sync::Arc;
use std::time::Duration;

use stepwise_agent::Agent;
use stepwise_config::AppConfig;
use stepwise_core::event::DomainEvent;
use stepwise_core::provider::Provider;
use stepwise_providers::OpenAiCompatProvider;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub async fn run(
    message: Option<String>,
    max_steps: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = build_provider(&config)?;

    let tool_timeout = config.agent.tool_timeout_secs.map(Duration::from_secs);
    let tools = Arc::new(stepwise_tools::default_registry(&config.tools, tool_timeout)?);

    let mut agent = Agent::with_provider(config.agent_config(), provider, tools)?;
    if let Some(steps) = max_steps {
        if steps == 0 {
            return Err("--max-steps must be at least 1".into());
        }
        agent = agent.with_max_steps(steps);
    }
    let agent = Arc::new(agent);

    let request = match message {
        Some(message) => message,
        None => prompt().await?,
    };
    if request.trim().is_empty() {
        warn!("Empty prompt provided");
        return Ok(());
    }

    spawn_event_logger(&agent);
    info!(model = %config.model, max_steps = agent.config().max_steps, "Processing request");

    let run = agent.run(Some(&request));
    tokio::pin!(run);
    let transcript = tokio::select! {
        result = &mut run => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down agent");
            agent.shutdown();
            run.await?
        }
    };

    println!("{transcript}");

    let status = agent.status();
    info!(
        state = %status.state,
        steps = status.current_step,
        messages = status.message_count,
        "Request processing completed"
    );
    Ok(())
}

/// An OpenAI-compatible provider for the configured endpoint.
///
/// Local endpoints (Ollama, llama.cpp servers) work without a key.
fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    let api_key = match &config.api_key {
        Some(key) => key.clone(),
        None if is_local_endpoint(&config.api_url) => String::new(),
        None => {
            eprintln!();
            eprintln!("  ERROR: No API key configured!");
            eprintln!();
            eprintln!("  Set STEPWISE_API_KEY or OPENAI_API_KEY, or add api_key to:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err("No API key found. See above for setup instructions.".into());
        }
    };

    Ok(Arc::new(OpenAiCompatProvider::new(
        "openai-compatible",
        &config.api_url,
        api_key,
    )))
}

fn is_local_endpoint(url: &str) -> bool {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', ':'])
        .next()
        .unwrap_or("");
    matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0")
}

async fn prompt() -> std::io::Result<String> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(b"Enter your prompt: ").await?;
    stderr.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn spawn_event_logger(agent: &Agent) {
    let mut rx = agent.events().subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.as_ref() {
                    DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
                        info!(tool = %tool_name, success, duration_ms, "Tool executed");
                    }
                    DomainEvent::StepCompleted { step, .. } => debug!(step, "Step completed"),
                    DomainEvent::AgentStateChanged { from, to, .. } => {
                        debug!(%from, %to, "Agent state changed");
                    }
                    DomainEvent::ErrorOccurred { context, error_message, .. } => {
                        warn!(context = %context, error = %error_message, "Agent error");
                    }
                },
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
