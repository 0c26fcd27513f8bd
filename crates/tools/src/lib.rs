//! Built-in tool implementations for Stepwise.
//!
//! Tools give the agent the ability to interact with the world:
//! run shell commands, read/write files, and end the run.

pub mod file_read;
pub mod file_write;
pub mod path;
pub mod shell;
pub mod terminate;

use std::time::Duration;

use stepwise_config::ToolsConfig;
use stepwise_core::tool::ToolRegistry;

pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use shell::ShellTool;
pub use terminate::TerminateTool;

/// Create a tool registry with all built-in tools.
///
/// The shell allowlist and file path restrictions come from the `[tools]`
/// config section. `timeout`, when set, bounds every tool call.
pub fn default_registry(
    config: &ToolsConfig,
    timeout: Option<Duration>,
) -> stepwise_core::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    if let Some(limit) = timeout {
        registry = registry.with_timeout(limit);
    }

    registry.register(Box::new(TerminateTool))?;
    registry.register(Box::new(ShellTool::new(config.shell_allowlist.clone())))?;
    registry.register(Box::new(FileReadTool::with_restrictions(
        config.allowed_roots.clone(),
        config.forbidden_paths.clone(),
    )))?;
    registry.register(Box::new(FileWriteTool::with_restrictions(
        config.allowed_roots.clone(),
        config.forbidden_paths.clone(),
    )))?;
    Ok(registry)
}
