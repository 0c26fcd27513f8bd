//! Agent configuration and state types.

use serde::{Deserialize, Serialize};

use crate::memory::DEFAULT_MAX_MESSAGES;
use crate::provider::ToolChoice;

/// Lifecycle state of an agent.
///
/// ```text
/// Idle ──run──▶ Running ──▶ Finished | Idle (step budget spent) | Error
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl AgentState {
    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Finished and Error are only left through a reset to Idle.
    pub fn can_transition_to(self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Finished)
                | (Running, Idle)
                | (Running, Error)
                | (Finished, Idle)
                | (Error, Idle)
        ) || self == next
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of an agent, for callers and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub current_step: u32,
    pub max_steps: u32,
    pub message_count: usize,
}

/// Configuration for the agent's behavior.
///
/// A "specialized agent" is just a different value of this struct: a
/// different system prompt, tool-choice policy and set of special tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name used in logs and events
    #[serde(default = "default_name")]
    pub name: String,

    /// System instruction sent ahead of the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Guidance appended as a trailing user turn on every think
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,

    /// Step budget per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// How many earlier identical assistant replies count as stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// Conversation memory capacity
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Truncate each tool observation to this many characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    /// Tool-choice policy for the think phase
    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Tools whose successful execution ends the run
    #[serde(default = "default_special_tools")]
    pub special_tools: Vec<String>,

    /// Model to request from the provider
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

pub const DEFAULT_AGENT_NAME: &str = "stepwise";
pub const DEFAULT_MAX_STEPS: u32 = 20;
pub const DEFAULT_DUPLICATE_THRESHOLD: usize = 2;
/// The tool that ends a run unless configured otherwise.
pub const DEFAULT_SPECIAL_TOOL: &str = "terminate";

fn default_name() -> String {
    DEFAULT_AGENT_NAME.into()
}
fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}
fn default_duplicate_threshold() -> usize {
    DEFAULT_DUPLICATE_THRESHOLD
}
fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}
fn default_special_tools() -> Vec<String> {
    vec![DEFAULT_SPECIAL_TOOL.into()]
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            system_prompt: None,
            next_step_prompt: None,
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            max_messages: default_max_messages(),
            max_observe: None,
            tool_choice: ToolChoice::default(),
            special_tools: default_special_tools(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl AgentConfig {
    /// Case-insensitive membership test against `special_tools`.
    pub fn is_special_tool(&self, name: &str) -> bool {
        self.special_tools
            .iter()
            .any(|special| special.eq_ignore_ascii_case(name))
    }
}
