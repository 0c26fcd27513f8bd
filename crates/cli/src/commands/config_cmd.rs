//! `stepwise config` — Configuration helpers.

use clap::Subcommand;
use stepwise_config::AppConfig;

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the default configuration as TOML
    #[default]
    Defaults,
    /// Print the config file path
    Path,
    /// Load and validate the config file
    Validate,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Defaults => print!("{}", AppConfig::default_toml()),
        ConfigAction::Path => println!("{}", AppConfig::config_dir().join("config.toml").display()),
        ConfigAction::Validate => validate()?,
    }
    Ok(())
}

fn validate() -> Result<(), Box<dyn std::error::Error>> {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  Config error: {e}");
            return Err(e.into());
        }
    };

    println!("  Config OK");
    println!("  Endpoint:    {}", config.api_url);
    println!("  Model:       {}", config.model);
    println!("  Max steps:   {}", config.agent.max_steps);
    println!("  Tool choice: {}", config.agent.tool_choice);
    if !config.has_api_key() {
        println!();
        println!("  Warning: no API key set (STEPWISE_API_KEY or OPENAI_API_KEY)");
    }
    Ok(())
}
