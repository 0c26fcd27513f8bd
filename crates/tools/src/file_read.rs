//! File read tool — read file contents with path validation.

use std::path::PathBuf;

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolArguments, ToolResult};

use crate::path::validate_path;

#[derive(Default)]
pub struct FileReadTool {
    /// Allowed root directories. Empty = allow all.
    pub allowed_roots: Vec<PathBuf>,
    /// Forbidden path prefixes.
    pub forbidden_paths: Vec<PathBuf>,
}

impl FileReadTool {
    /// Create a file read tool with no path restrictions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file read tool with path restrictions.
    pub fn with_restrictions(allowed_roots: Vec<PathBuf>, forbidden_paths: Vec<PathBuf>) -> Self {
        Self {
            allowed_roots,
            forbidden_paths,
        }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = validate_path(path, &self.allowed_roots, &self.forbidden_paths).map_err(
            |e| ToolError::PermissionDenied {
                tool_name: "file_read".into(),
                reason: e.to_string(),
            },
        )?;

        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "file_read".into(),
                reason: format!("Failed to read file: {e}"),
            })?;

        Ok(ToolResult::success(content))
    }
}
