//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent runtime.
//! This crate has **no I/O dependencies**: it defines the domain model
//! the agent loop, providers and tools implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod memory;
pub mod provider;
pub mod tool;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use memory::Memory;
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
pub use tool::{Tool, ToolArguments, ToolCall, ToolRegistry, ToolResult};
pub use agent::{AgentConfig, AgentState, AgentStatus};
pub use event::{DomainEvent, EventBus};
