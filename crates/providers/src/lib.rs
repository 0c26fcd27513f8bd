//! LLM Provider implementations for Stepwise.
//!
//! All providers implement the `stepwise_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
