//! `stepwise tools` — Print the tool catalog.

use stepwise_config::AppConfig;
use stepwise_core::tool::ToolRegistry;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = stepwise_tools::default_registry(&config.tools, None)?;
    println!("{}", serde_json::to_string_pretty(&catalog(&registry))?);
    Ok(())
}

/// The tools in function-calling form, sorted by name.
pub fn catalog(registry: &ToolRegistry) -> serde_json::Value {
    registry
        .definitions()
        .into_iter()
        .map(|def| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": def.name,
                    "description": def.description,
                    "parameters": def.parameters,
                }
            })
        })
        .collect()
}
