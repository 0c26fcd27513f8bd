//! Agent patterns — structured reasoning strategies.
//!
//! Only ReAct is implemented: think about the conversation, act through
//! tools, observe the results.

pub mod react;

pub use react::{ProviderThink, ThinkRequest, ThinkResponse, ThinkStrategy};

#[cfg(test)]
pub(crate) mod test_helpers;
