//! ReAct pattern — Think → Act → Observe, one step at a time.
//!
//! Each step asks a [`ThinkStrategy`] what to do next given the
//! conversation so far, then executes the proposed tool calls through the
//! registry and records every observation in memory. The step loop and
//! its state transitions live in [`crate::loop_runner`]; this module only
//! reports whether a step finished the run.
//!
//! # Think outcome
//!
//! | Policy     | Proposed calls        | Acts when                     |
//! |------------|-----------------------|-------------------------------|
//! | `auto`     | kept                  | calls present or text present |
//! | `required` | kept                  | always                        |
//! | `none`     | dropped with warning  | text present                  |

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use stepwise_core::agent::AgentConfig;
use stepwise_core::error::{Error, ProviderError, Result};
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::memory::Memory;
use stepwise_core::message::{Message, MessageToolCall};
use stepwise_core::provider::{Provider, ProviderRequest, ToolChoice, ToolDefinition};
use stepwise_core::tool::{ToolRegistry, ToolResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const NO_ACTION_NEEDED: &str = "Thinking complete - no action needed";
pub const NOTHING_TO_EXECUTE: &str = "No content or commands to execute";
pub const TOOL_CALLS_REQUIRED: &str = "Error: tool calls are required but none were proposed";
pub const TOKEN_LIMIT_REACHED: &str = "Maximum token limit reached, cannot continue execution";

/// Everything the think phase gets to see.
#[derive(Debug, Clone)]
pub struct ThinkRequest {
    pub system_prompt: Option<String>,
    /// Next-step guidance, sent after the conversation but never stored
    pub guidance: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
}

/// What the think phase decided: some text, some proposed calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ThinkResponse {
    pub content: String,
    pub tool_calls: Vec<MessageToolCall>,
}

/// Decides the next move from the conversation so far.
///
/// The default implementation is [`ProviderThink`]. Tests and alternative
/// planners implement this directly.
#[async_trait]
pub trait ThinkStrategy: Send + Sync {
    async fn think(&self, request: ThinkRequest) -> std::result::Result<ThinkResponse, ProviderError>;
}

/// Think by asking an LLM provider.
pub struct ProviderThink {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderThink {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Take model, temperature and max tokens from an agent config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AgentConfig) -> Self {
        Self::new(provider, config.model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ThinkStrategy for ProviderThink {
    async fn think(&self, request: ThinkRequest) -> std::result::Result<ThinkResponse, ProviderError> {
        let mut messages = request.messages;
        if let Some(guidance) = request.guidance.filter(|g| !g.trim().is_empty()) {
            messages.push(Message::user(guidance));
        }

        let response = self
            .provider
            .complete(ProviderRequest {
                model: self.model.clone(),
                system_prompt: request.system_prompt,
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: request.tools,
                tool_choice: request.tool_choice,
            })
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                provider = %self.provider.name(),
                model = %response.model,
                total_tokens = usage.total_tokens,
                "Think completed"
            );
        }

        Ok(ThinkResponse {
            content: response.message.content.unwrap_or_default(),
            tool_calls: response.message.tool_calls,
        })
    }
}

/// Borrowed view of an agent for the duration of one step.
pub(crate) struct StepContext<'a> {
    pub config: &'a AgentConfig,
    pub strategy: &'a dyn ThinkStrategy,
    pub tools: &'a ToolRegistry,
    pub memory: &'a Mutex<Memory>,
    pub guidance: Option<String>,
    pub cancel: &'a CancellationToken,
    pub events: &'a EventBus,
}

impl StepContext<'_> {
    fn memory(&self) -> Result<MutexGuard<'_, Memory>> {
        self.memory
            .lock()
            .map_err(|_| Error::Internal("conversation memory lock poisoned".into()))
    }

    fn remember(&self, message: Message) -> Result<()> {
        self.memory()?.append(message)
    }
}

/// Result of one think/act step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StepOutcome {
    pub summary: String,
    /// The run should end after this step.
    pub finished: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Thought {
    pub should_act: bool,
    pub tool_calls: Vec<MessageToolCall>,
    pub finished: bool,
}

/// Run one step. `Err` means the agent itself is broken (e.g. memory
/// rejected a message); everything else is reported in the summary.
pub(crate) async fn step(cx: &StepContext<'_>) -> Result<StepOutcome> {
    let thought = think(cx).await?;
    if !thought.should_act {
        return Ok(StepOutcome {
            summary: NO_ACTION_NEEDED.into(),
            finished: thought.finished,
        });
    }
    act(cx, thought.tool_calls).await
}

pub(crate) async fn think(cx: &StepContext<'_>) -> Result<Thought> {
    let messages = cx.memory()?.messages().to_vec();
    let request = ThinkRequest {
        system_prompt: cx.config.system_prompt.clone(),
        guidance: cx.guidance.clone(),
        messages,
        tools: cx.tools.definitions(),
        tool_choice: cx.config.tool_choice,
    };

    let response = match cx.strategy.think(request).await {
        Ok(response) => response,
        Err(ProviderError::ContextLengthExceeded(detail)) => {
            warn!(agent = %cx.config.name, detail = %detail, "Context window exhausted");
            cx.remember(Message::assistant(TOKEN_LIMIT_REACHED))?;
            return Ok(Thought {
                finished: true,
                ..Thought::default()
            });
        }
        Err(e) => {
            warn!(agent = %cx.config.name, error = %e, "Think phase failed");
            cx.events.publish(DomainEvent::ErrorOccurred {
                context: format!("{}: think", cx.config.name),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            cx.remember(Message::assistant(format!(
                "Error encountered while processing: {e}"
            )))?;
            return Ok(Thought::default());
        }
    };

    let content = response.content;
    let mut tool_calls: Vec<MessageToolCall> = response
        .tool_calls
        .into_iter()
        .map(MessageToolCall::normalized)
        .collect();

    if cx.config.tool_choice == ToolChoice::None && !tool_calls.is_empty() {
        warn!(
            agent = %cx.config.name,
            dropped = tool_calls.len(),
            "Tool calls proposed while tool choice is 'none'; ignoring them"
        );
        tool_calls.clear();
    }

    info!(
        agent = %cx.config.name,
        tool_calls = tool_calls.len(),
        tools = ?tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        "Thought complete"
    );

    let message = if tool_calls.is_empty() {
        Message::assistant(content.clone())
    } else {
        Message::from_tool_calls(content.clone(), tool_calls.clone())
    };
    cx.remember(message)?;

    let should_act = match cx.config.tool_choice {
        ToolChoice::Required => true,
        ToolChoice::Auto => !tool_calls.is_empty() || !content.is_empty(),
        ToolChoice::None => !content.is_empty(),
    };

    Ok(Thought {
        should_act,
        tool_calls,
        finished: false,
    })
}

pub(crate) async fn act(cx: &StepContext<'_>, tool_calls: Vec<MessageToolCall>) -> Result<StepOutcome> {
    if tool_calls.is_empty() {
        if cx.config.tool_choice == ToolChoice::Required {
            cx.remember(Message::assistant(TOOL_CALLS_REQUIRED))?;
            return Ok(StepOutcome {
                summary: TOOL_CALLS_REQUIRED.into(),
                finished: false,
            });
        }

        let last = cx
            .memory()?
            .messages()
            .last()
            .map(|m| m.text().to_string())
            .filter(|text| !text.is_empty());
        return Ok(StepOutcome {
            summary: last.unwrap_or_else(|| NOTHING_TO_EXECUTE.into()),
            finished: false,
        });
    }

    let mut observations = Vec::with_capacity(tool_calls.len());
    let mut finished = false;

    for call in &tool_calls {
        let start = Instant::now();
        let result = cx.tools.execute_call(call, cx.cancel).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        cx.events.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: !result.is_error(),
            duration_ms,
            timestamp: Utc::now(),
        });

        let observation = observe(&call.name, &result, cx.config.max_observe);
        debug!(tool = %call.name, call_id = %call.id, chars = observation.chars().count(), "Observation recorded");

        cx.remember(
            Message::tool_result(&call.id, &call.name, &observation)
                .with_base64_image(result.base64_image.clone()),
        )?;

        if !result.is_error() && cx.config.is_special_tool(&call.name) {
            info!(agent = %cx.config.name, tool = %call.name, "Special tool completed the task");
            finished = true;
        }

        observations.push(observation);
    }

    Ok(StepOutcome {
        summary: observations.join("\n\n"),
        finished,
    })
}

/// Render a tool result as the text the model will observe.
pub(crate) fn observe(name: &str, result: &ToolResult, max_observe: Option<usize>) -> String {
    let text = match (&result.error, &result.output) {
        (Some(error), _) if !error.is_empty() => format!("Error: {error}"),
        (_, Some(output)) if !output.is_empty() => output.clone(),
        _ => format!("`{name}` completed with no output"),
    };
    truncate_chars(text, max_observe)
}

fn truncate_chars(text: String, limit: Option<usize>) -> String {
    match limit {
        Some(limit) if text.chars().count() > limit => text.chars().take(limit).collect(),
        _ => text,
    }
}
