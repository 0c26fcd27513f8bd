//! Terminate tool — lets the model end the run.
//!
//! Registered as a special tool: a successful call moves the agent to
//! Finished once the current batch of calls has executed.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolArguments, ToolResult};

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        "terminate"
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task. When you have finished all the tasks, call this tool to end the work."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<ToolResult, ToolError> {
        let status = arguments
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'status' argument".into()))?;

        if !matches!(status, "success" | "failure") {
            return Err(ToolError::InvalidArguments(format!(
                "Invalid status '{status}', expected 'success' or 'failure'"
            )));
        }

        Ok(ToolResult::success(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}
