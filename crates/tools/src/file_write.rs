//! File write tool — write or create files with path validation.

use std::path::PathBuf;

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolArguments, ToolResult};

use crate::path::validate_path;

#[derive(Default)]
pub struct FileWriteTool {
    /// Allowed root directories. Empty = allow all.
    pub allowed_roots: Vec<PathBuf>,
    /// Forbidden path prefixes.
    pub forbidden_paths: Vec<PathBuf>,
}

impl FileWriteTool {
    /// Create a file write tool with no path restrictions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file write tool with path restrictions.
    pub fn with_restrictions(allowed_roots: Vec<PathBuf>, forbidden_paths: Vec<PathBuf>) -> Self {
        Self {
            allowed_roots,
            forbidden_paths,
        }
    }

    fn failed(reason: String) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "file_write".into(),
            reason,
        }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let resolved = validate_path(path, &self.allowed_roots, &self.forbidden_paths).map_err(
            |e| ToolError::PermissionDenied {
                tool_name: "file_write".into(),
                reason: e.to_string(),
            },
        )?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::failed(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| Self::failed(format!("Failed to write file: {e}")))?;

        Ok(ToolResult::success(format!(
            "Successfully wrote {} bytes to {path}",
            content.len()
        )))
    }
}
