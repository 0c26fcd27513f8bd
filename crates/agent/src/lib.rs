//! The agent loop — the heart of Stepwise.
//!
//! An [`Agent`] works a request in bounded **Think → Act → Observe** steps:
//!
//! 1. **Think**: send the conversation, tool definitions and next-step
//!    guidance to the planner (an LLM provider by default)
//! 2. **Act**: execute every proposed tool call through the registry
//! 3. **Observe**: record each result in memory as a tool message
//!
//! The loop ends when a special tool (e.g. `terminate`) succeeds, the step
//! budget is spent, the agent is shut down, or a step faults.

pub mod loop_runner;
pub mod patterns;

pub use loop_runner::{Agent, STUCK_ADMONITION};
pub use patterns::{ProviderThink, ThinkRequest, ThinkResponse, ThinkStrategy};
