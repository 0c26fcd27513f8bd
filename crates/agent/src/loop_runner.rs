//! The agent step loop — a bounded state machine around ReAct steps.
//!
//! ```text
//!            run()                 special tool / context exhausted
//!   Idle ─────────────▶ Running ─────────────────────────────▶ Finished
//!    ▲                    │  │
//!    │  budget spent /    │  │ memory fault / panic in a step
//!    └──── shutdown ──────┘  └──────────────────────────────▶ Error
//! ```
//!
//! Finished and Error are left only through [`Agent::shutdown`].

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::FutureExt;
use stepwise_core::agent::{AgentConfig, AgentState, AgentStatus};
use stepwise_core::error::{Error, Result};
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::memory::Memory;
use stepwise_core::message::{Message, Role};
use stepwise_core::provider::Provider;
use stepwise_core::tool::{ToolRegistry, panic_message};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::patterns::react::{self, ProviderThink, StepContext, ThinkStrategy};

/// Prepended to the next-step guidance when the agent repeats itself.
pub const STUCK_ADMONITION: &str = "Observed duplicate responses. Consider new strategies and avoid repeating ineffective paths already attempted.";

struct Runtime {
    state: AgentState,
    current_step: u32,
    guidance: Option<String>,
    cancel: CancellationToken,
}

enum LoopEnd {
    Finished,
    Exhausted,
    Shutdown,
    Fault(String),
}

/// A tool-calling agent: one conversation, one run at a time.
///
/// `run` takes `&self`, so an agent can be shared as `Arc<Agent>`; a second
/// concurrent `run` is rejected with [`Error::InvalidState`].
pub struct Agent {
    config: AgentConfig,
    strategy: Arc<dyn ThinkStrategy>,
    tools: Arc<ToolRegistry>,
    memory: Mutex<Memory>,
    runtime: Mutex<Runtime>,
    events: Arc<EventBus>,
}

impl Agent {
    /// Create an agent with an explicit think strategy.
    pub fn new(
        config: AgentConfig,
        strategy: Arc<dyn ThinkStrategy>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self> {
        if config.max_steps == 0 {
            return Err(Error::InvalidArgument("max_steps must be at least 1".into()));
        }
        let memory = Memory::new(config.max_messages)?;

        Ok(Self {
            runtime: Mutex::new(Runtime {
                state: AgentState::Idle,
                current_step: 0,
                guidance: config.next_step_prompt.clone(),
                cancel: CancellationToken::new(),
            }),
            config,
            strategy,
            tools,
            memory: Mutex::new(memory),
            events: Arc::new(EventBus::default()),
        })
    }

    /// Create an agent that thinks by calling an LLM provider.
    pub fn with_provider(
        config: AgentConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self> {
        let strategy = Arc::new(ProviderThink::from_config(provider, &config));
        Self::new(config, strategy, tools)
    }

    /// Publish domain events on a shared bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Override the step budget (at least 1).
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.config.max_steps = max_steps.max(1);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn status(&self) -> AgentStatus {
        let (state, current_step) = {
            let rt = self.runtime();
            (rt.state, rt.current_step)
        };
        AgentStatus {
            state,
            current_step,
            max_steps: self.config.max_steps,
            message_count: self.memory_view().len(),
        }
    }

    /// Snapshot of the conversation memory.
    pub fn messages(&self) -> Vec<Message> {
        self.memory_view().messages().to_vec()
    }

    /// Stop the agent.
    ///
    /// Cancels in-flight tool calls of a running agent; the loop then stops
    /// at the next step boundary. A non-running agent returns to Idle with
    /// its guidance reset. Memory is preserved. Calling this repeatedly is
    /// harmless.
    pub fn shutdown(&self) {
        let from = {
            let mut rt = self.runtime();
            rt.cancel.cancel();
            rt.guidance = self.config.next_step_prompt.clone();
            if rt.state == AgentState::Running {
                info!(agent = %self.config.name, "Shutdown requested while running");
                return;
            }
            std::mem::replace(&mut rt.state, AgentState::Idle)
        };
        if from != AgentState::Idle {
            self.publish_transition(from, AgentState::Idle);
        }
    }

    /// Run the step loop until the task is done, the budget is spent, or
    /// the agent faults.
    ///
    /// Returns the transcript: one `Step n: ...` line per step plus a
    /// termination or fault line. Fails only if the agent is not Idle.
    pub async fn run(&self, request: Option<&str>) -> Result<String> {
        let cancel = self.begin()?;
        let mut guard = RunGuard { agent: self, armed: true };

        let mut results = Vec::new();
        let end = self.drive(request, &cancel, &mut results).await;

        match end {
            LoopEnd::Finished => {
                info!(agent = %self.config.name, steps = results.len(), "Run finished");
            }
            LoopEnd::Exhausted => {
                warn!(agent = %self.config.name, max_steps = self.config.max_steps, "Step budget exhausted");
                results.push(format!(
                    "Terminated: Reached max steps ({})",
                    self.config.max_steps
                ));
                self.set_state(AgentState::Idle);
            }
            LoopEnd::Shutdown => {
                info!(agent = %self.config.name, "Run stopped by shutdown");
                results.push("Terminated: Shutdown requested".into());
                self.set_state(AgentState::Idle);
            }
            LoopEnd::Fault(reason) => {
                error!(agent = %self.config.name, reason = %reason, "Unrecoverable fault");
                self.events.publish(DomainEvent::ErrorOccurred {
                    context: format!("{}: run", self.config.name),
                    error_message: reason.clone(),
                    timestamp: Utc::now(),
                });
                results.push(format!("Error: unrecoverable fault: {reason}"));
                self.set_state(AgentState::Error);
            }
        }
        guard.armed = false;

        if results.is_empty() {
            return Ok("No steps executed".into());
        }
        Ok(results.join("\n"))
    }

    /// Idle gate: switch to Running atomically or refuse.
    fn begin(&self) -> Result<CancellationToken> {
        let token = {
            let mut rt = self.runtime();
            if rt.state != AgentState::Idle {
                return Err(Error::InvalidState(format!(
                    "agent '{}' cannot run while {}",
                    self.config.name, rt.state
                )));
            }
            rt.state = AgentState::Running;
            rt.current_step = 0;
            rt.guidance = self.config.next_step_prompt.clone();
            rt.cancel = CancellationToken::new();
            rt.cancel.clone()
        };
        self.publish_transition(AgentState::Idle, AgentState::Running);
        Ok(token)
    }

    async fn drive(
        &self,
        request: Option<&str>,
        cancel: &CancellationToken,
        results: &mut Vec<String>,
    ) -> LoopEnd {
        if let Some(text) = request.filter(|r| !r.trim().is_empty()) {
            let appended = self.memory().and_then(|mut m| m.append(Message::user(text)));
            if let Err(e) = appended {
                return LoopEnd::Fault(e.to_string());
            }
        }

        loop {
            let (step, guidance) = {
                let mut rt = self.runtime();
                if rt.state == AgentState::Finished {
                    return LoopEnd::Finished;
                }
                if rt.current_step >= self.config.max_steps {
                    return LoopEnd::Exhausted;
                }
                if cancel.is_cancelled() {
                    return LoopEnd::Shutdown;
                }
                rt.current_step += 1;
                (rt.current_step, rt.guidance.clone())
            };

            info!(agent = %self.config.name, step, max_steps = self.config.max_steps, "Executing step");

            let cx = StepContext {
                config: &self.config,
                strategy: self.strategy.as_ref(),
                tools: &self.tools,
                memory: &self.memory,
                guidance,
                cancel,
                events: &self.events,
            };

            let outcome = match AssertUnwindSafe(react::step(&cx)).catch_unwind().await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => return LoopEnd::Fault(e.to_string()),
                Err(panic) => {
                    return LoopEnd::Fault(format!(
                        "step {step} panicked: {}",
                        panic_message(panic.as_ref())
                    ));
                }
            };

            if outcome.finished {
                self.set_state(AgentState::Finished);
            }
            self.check_stuck();

            self.events.publish(DomainEvent::StepCompleted {
                agent: self.config.name.clone(),
                step,
                summary: outcome.summary.clone(),
                timestamp: Utc::now(),
            });
            results.push(format!("Step {step}: {}", outcome.summary));
        }
    }

    fn check_stuck(&self) {
        let stuck = is_stuck(self.memory_view().messages(), self.config.duplicate_threshold);
        if !stuck {
            return;
        }

        let mut rt = self.runtime();
        let current = rt.guidance.take().unwrap_or_default();
        if current.contains(STUCK_ADMONITION) {
            rt.guidance = Some(current);
            return;
        }
        warn!(agent = %self.config.name, "Agent detected stuck state, adjusting guidance");
        rt.guidance = Some(if current.is_empty() {
            STUCK_ADMONITION.to_string()
        } else {
            format!("{STUCK_ADMONITION}\n{current}")
        });
    }

    fn set_state(&self, next: AgentState) {
        let from = {
            let mut rt = self.runtime();
            let from = rt.state;
            if from == next {
                return;
            }
            debug_assert!(from.can_transition_to(next), "{from} -> {next}");
            rt.state = next;
            from
        };
        self.publish_transition(from, next);
    }

    fn publish_transition(&self, from: AgentState, to: AgentState) {
        self.events.publish(DomainEvent::AgentStateChanged {
            agent: self.config.name.clone(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn memory(&self) -> Result<MutexGuard<'_, Memory>> {
        self.memory
            .lock()
            .map_err(|_| Error::Internal("conversation memory lock poisoned".into()))
    }

    /// Read-only access that survives a poisoned lock.
    fn memory_view(&self) -> MutexGuard<'_, Memory> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Puts a dropped, still-running agent into Error.
struct RunGuard<'a> {
    agent: &'a Agent,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut rt = self.agent.runtime();
        if rt.state == AgentState::Running {
            warn!(agent = %self.agent.config.name, step = rt.current_step, "Run abandoned mid-step");
            rt.cancel.cancel();
            rt.state = AgentState::Error;
        }
    }
}

/// Whether the latest assistant reply repeats earlier ones at least
/// `threshold` times. An empty latest reply (a tool-only step) is never
/// stuck, and a threshold of 0 disables detection.
pub(crate) fn is_stuck(messages: &[Message], threshold: usize) -> bool {
    if threshold == 0 {
        return false;
    }
    let Some((index, last)) = messages
        .iter()
        .enumerate()
        .rev()
        .find(|(_, m)| m.role == Role::Assistant)
    else {
        return false;
    };
    if last.text().is_empty() {
        return false;
    }

    let duplicates = messages[..index]
        .iter()
        .filter(|m| m.role == Role::Assistant && m.content == last.content)
        .count();
    duplicates >= threshold
}
