//! Tool trait and registry — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! execute shell commands, read/write files, end the run, etc.
//!
//! The [`ToolRegistry`] is also the dispatcher. Every way a tool call can go
//! wrong (unknown tool, malformed arguments, a failing or panicking tool
//! body, cancellation) comes back as a [`ToolResult`] with `error` set, so
//! the agent loop never handles tool failures as control flow.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result, ToolError, ToolErrorKind};
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// Structured tool arguments: a JSON object. Values are `serde_json::Value`,
/// so tools match exhaustively on null/bool/number/string/array/object.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// A request to execute a tool, with its arguments already parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: ToolArguments,
}

impl ToolCall {
    /// Parse the transport form of a call.
    ///
    /// A blank payload is treated as `{}`. Anything that is not a JSON
    /// object is rejected with [`ToolError::InvalidArguments`].
    pub fn parse(call: &MessageToolCall) -> std::result::Result<Self, ToolError> {
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            ToolArguments::new()
        } else {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(other) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "error parsing arguments for {}: expected a JSON object, got {}",
                        call.name,
                        json_type_name(&other)
                    )));
                }
                Err(e) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "error parsing arguments for {}: invalid JSON ({e})",
                        call.name
                    )));
                }
            }
        };

        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// The result of a tool execution.
///
/// A result with `error` set is a failure regardless of `output`; `output`
/// may still carry partial diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Which failure class produced `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,

    /// Image payload (side channel)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,

    /// Free-form system note (side channel)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result with text output.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    /// A failed result built from a tool error.
    pub fn failure(error: ToolError) -> Self {
        Self {
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_system(mut self, note: impl Into<String>) -> Self {
        self.system = Some(note.into());
        self
    }

    pub fn with_base64_image(mut self, image: impl Into<String>) -> Self {
        self.base64_image = Some(image.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Combine two results into one.
    ///
    /// Text fields (`output`, `error`, `system`) are concatenated. `data` and
    /// `base64_image` cannot be combined: if both sides carry one, the merge
    /// fails with [`ToolError::MergeConflict`].
    pub fn merge(self, other: ToolResult) -> std::result::Result<ToolResult, ToolError> {
        Ok(ToolResult {
            output: concat(self.output, other.output),
            error: concat(self.error, other.error),
            error_kind: self.error_kind.or(other.error_kind),
            base64_image: exclusive("base64_image", self.base64_image, other.base64_image)?,
            system: concat(self.system, other.system),
            data: exclusive("data", self.data, other.data)?,
        })
    }
}

fn concat(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + &b),
        (a, b) => a.or(b),
    }
}

fn exclusive<T>(
    field: &str,
    a: Option<T>,
    b: Option<T>,
) -> std::result::Result<Option<T>, ToolError> {
    match (a, b) {
        (Some(_), Some(_)) => Err(ToolError::MergeConflict(format!(
            "both results carry {field}"
        ))),
        (a, b) => Ok(a.or(b)),
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.error, &self.output) {
            (Some(error), _) if !error.is_empty() => write!(f, "Error: {error}"),
            (_, Some(output)) => f.write_str(output),
            _ => Ok(()),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (terminate, shell, file_read, file_write, etc.) implements this
/// trait. Tools are registered in the ToolRegistry and made available to
/// the agent loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: ToolArguments) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
///
/// Registration is expected to happen once at startup; afterwards the
/// registry is shared read-only behind an `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: None,
        }
    }

    /// Abandon any single tool execution that runs longer than `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Register a tool.
    ///
    /// A tool with the same name replaces the previous one (last write
    /// wins); this is logged, not rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let name = tool.name().trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidArgument("tool name must not be empty".into()));
        }
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replacing previously registered tool");
        }
        Ok(())
    }

    /// Remove a tool. Returns `false` if nothing was registered under `name`.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|(name, tool)| ToolDefinition {
                name: name.clone(),
                ..tool.to_definition()
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name. Never fails: every fault becomes an error result.
    pub async fn execute(
        &self,
        name: &str,
        arguments: ToolArguments,
        cancel: &CancellationToken,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Requested tool is not registered");
            return ToolResult::failure(ToolError::NotFound(name.to_string()));
        };
        if cancel.is_cancelled() {
            return ToolResult::failure(ToolError::Cancelled(name.to_string()));
        }

        let start = Instant::now();
        let body = AssertUnwindSafe(tool.execute(arguments)).catch_unwind();
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, body).await.map_err(|_| {
                    ToolError::Timeout {
                        tool_name: name.to_string(),
                        timeout_secs: limit.as_secs(),
                    }
                }),
                None => Ok(body.await),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ToolError::Cancelled(name.to_string())),
            outcome = bounded => outcome,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => ToolResult::failure(e),
            Ok(Err(panic)) => ToolResult::failure(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("panicked: {}", panic_message(panic.as_ref())),
            }),
            Err(e) => ToolResult::failure(e),
        };

        if result.is_error() {
            warn!(tool = %name, duration_ms, error = ?result.error, "Tool execution failed");
        } else {
            debug!(tool = %name, duration_ms, "Tool executed");
        }
        result
    }

    /// Parse a call in transport form and execute it.
    ///
    /// Unknown tools are reported before the arguments are looked at.
    /// Unparsable arguments produce an [`ToolErrorKind::InvalidArguments`]
    /// result, distinct from not-found and execution failures.
    pub async fn execute_call(
        &self,
        call: &MessageToolCall,
        cancel: &CancellationToken,
    ) -> ToolResult {
        if !self.has(&call.name) {
            warn!(tool = %call.name, call_id = %call.id, "Requested tool is not registered");
            return ToolResult::failure(ToolError::NotFound(call.name.clone()));
        }
        match ToolCall::parse(call) {
            Ok(parsed) => self.execute(&parsed.name, parsed.arguments, cancel).await,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Malformed tool arguments");
                ToolResult::failure(e)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The message carried by a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: ToolArguments) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
            Ok(ToolResult::success(text))
        }
    }

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn name(&self) -> &str { "panic" }
        fn description(&self) -> &str { "Always panics" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, _arguments: ToolArguments) -> std::result::Result<ToolResult, ToolError> {
            panic!("boom");
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str { "slow" }
        fn description(&self) -> &str { "Sleeps for a minute" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, _arguments: ToolArguments) -> std::result::Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolResult::success("done"))
        }
    }

    fn args(value: serde_json::Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        registry.register(Box::new(PanicTool)).unwrap();
        registry.register(Box::new(SlowTool)).unwrap();
        registry
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.has("slow"));
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.list(), vec!["echo", "panic", "slow"]);
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].parameters["required"], serde_json::json!(["text"]));
    }

    #[test]
    fn duplicate_registration_overwrites() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        registry.register(Box::new(EchoTool)).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_name_rejected() {
        struct Nameless;
        #[async_trait]
        impl Tool for Nameless {
            fn name(&self) -> &str { "  " }
            fn description(&self) -> &str { "" }
            fn parameters_schema(&self) -> serde_json::Value { serde_json::json!({}) }
            async fn execute(&self, _a: ToolArguments) -> std::result::Result<ToolResult, ToolError> {
                Ok(ToolResult::default())
            }
        }

        let mut registry = ToolRegistry::new();
        let err = registry.register(Box::new(Nameless)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_missing_is_noop() {
        let mut registry = registry();
        assert!(!registry.unregister("nonexistent"));
        assert!(registry.unregister("echo"));
        assert!(!registry.has("echo"));
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let registry = registry();
        let result = registry
            .execute("echo", args(serde_json::json!({"text": "hello world"})), &CancellationToken::new())
            .await;
        assert!(!result.is_error());
        assert_eq!(result.output.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute("nonexistent", ToolArguments::new(), &CancellationToken::new())
            .await;
        assert_eq!(result.error.as_deref(), Some("tool not found: nonexistent"));
        assert_eq!(result.error_kind, Some(ToolErrorKind::NotFound));
    }

    #[tokio::test]
    async fn tool_error_becomes_result() {
        let registry = registry();
        let result = registry
            .execute("echo", ToolArguments::new(), &CancellationToken::new())
            .await;
        assert!(result.is_error());
        assert_eq!(result.error_kind, Some(ToolErrorKind::InvalidArguments));
    }

    #[tokio::test]
    async fn panicking_tool_becomes_result() {
        let registry = registry();
        let result = registry
            .execute("panic", ToolArguments::new(), &CancellationToken::new())
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::ExecutionFailed));
        assert!(result.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn execute_call_parses_arguments() {
        let registry = registry();
        let call = MessageToolCall::new("call_1", "echo", r#"{"text":"hi"}"#);
        let result = registry.execute_call(&call, &CancellationToken::new()).await;
        assert_eq!(result.output.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_tagged_distinctly() {
        let registry = registry();
        let token = CancellationToken::new();

        let bad_json = MessageToolCall::new("call_1", "echo", "{not json");
        let result = registry.execute_call(&bad_json, &token).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::InvalidArguments));
        assert!(result.error.unwrap().contains("error parsing arguments for echo"));

        let not_object = MessageToolCall::new("call_2", "echo", "[1, 2]");
        let result = registry.execute_call(&not_object, &token).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::InvalidArguments));

        let unknown = MessageToolCall::new("call_3", "nonexistent", "{not json");
        let result = registry.execute_call(&unknown, &token).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_hung_tool() {
        let registry = registry();
        let token = CancellationToken::new();

        let (result, _) = tokio::join!(
            registry.execute("slow", ToolArguments::new(), &token),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                token.cancel();
            }
        );
        assert_eq!(result.error_kind, Some(ToolErrorKind::Cancelled));
        assert!(result.error.unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let registry = registry();
        let token = CancellationToken::new();
        token.cancel();
        let result = registry
            .execute("echo", args(serde_json::json!({"text": "hi"})), &token)
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let registry = registry().with_timeout(Duration::from_secs(1));
        let result = registry
            .execute("slow", ToolArguments::new(), &CancellationToken::new())
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::Timeout));
    }

    #[test]
    fn merge_concatenates_text_fields() {
        let a = ToolResult::success("part one, ").with_system("note a");
        let b = ToolResult::success("part two").with_system("; note b");
        let merged = a.merge(b).unwrap();
        assert_eq!(merged.output.as_deref(), Some("part one, part two"));
        assert_eq!(merged.system.as_deref(), Some("note a; note b"));
        assert!(!merged.is_error());
    }

    #[test]
    fn merge_rejects_two_images() {
        let a = ToolResult::success("a").with_base64_image("AAAA");
        let b = ToolResult::success("b").with_base64_image("BBBB");
        let err = a.merge(b).unwrap_err();
        assert!(matches!(err, ToolError::MergeConflict(_)));
    }

    #[test]
    fn merge_keeps_failure() {
        let ok = ToolResult::success("partial");
        let failed = ToolResult::failure(ToolError::NotFound("x".into()));
        let merged = ok.merge(failed).unwrap();
        assert!(merged.is_error());
        assert_eq!(merged.error_kind, Some(ToolErrorKind::NotFound));
    }

    #[test]
    fn display_prefers_error() {
        let mut result = ToolResult::success("diagnostics");
        assert_eq!(result.to_string(), "diagnostics");
        result.error = Some("bad".into());
        assert_eq!(result.to_string(), "Error: bad");
    }

    #[test]
    fn merge_rejects_two_data_payloads() {
        let a = ToolResult::success("a").with_data(serde_json::json!({"rows": 1}));
        let b = ToolResult::success("b").with_data(serde_json::json!({"rows": 2}));
        assert!(matches!(a.merge(b), Err(ToolError::MergeConflict(_))));
    }

    #[test]
    fn merge_keeps_single_data_payload() {
        let a = ToolResult::success("a");
        let b = ToolResult::success("b").with_data(serde_json::json!({"rows": 2}));
        let merged = a.merge(b).unwrap();
        assert_eq!(merged.data, Some(serde_json::json!({"rows": 2})));
    }

    struct PaddedTool;

    #[async_trait]
    impl Tool for PaddedTool {
        fn name(&self) -> &str { "  padded  " }
        fn description(&self) -> &str { "Name with whitespace" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, _arguments: ToolArguments) -> std::result::Result<ToolResult, ToolError> {
            Ok(ToolResult::success("ok"))
        }
    }

    #[test]
    fn definitions_use_registered_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(PaddedTool)).unwrap();
        assert_eq!(registry.list(), vec!["padded"]);
        let defs = registry.definitions();
        assert_eq!(defs[0].name, "padded");
        assert_eq!(defs[0].description, "Name with whitespace");
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
