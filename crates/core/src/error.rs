//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Stepwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller errors (rejected synchronously, never retried) ---
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArguments(String),

    #[error("tool '{tool_name}' failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("tool '{tool_name}' timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("tool '{0}' was cancelled")]
    Cancelled(String),

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Cannot combine tool results: {0}")]
    MergeConflict(String),
}

/// Coarse classification of a [`ToolError`], carried on failed tool results
/// so callers can tell malformed LLM output from genuine tool faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    NotFound,
    InvalidArguments,
    ExecutionFailed,
    Timeout,
    Cancelled,
    PermissionDenied,
    MergeConflict,
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::NotFound(_) => ToolErrorKind::NotFound,
            Self::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            Self::ExecutionFailed { .. } => ToolErrorKind::ExecutionFailed,
            Self::Timeout { .. } => ToolErrorKind::Timeout,
            Self::Cancelled(_) => ToolErrorKind::Cancelled,
            Self::PermissionDenied { .. } => ToolErrorKind::PermissionDenied,
            Self::MergeConflict(_) => ToolErrorKind::MergeConflict,
        }
    }
}
