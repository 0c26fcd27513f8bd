//! Configuration loading, validation, and management for Stepwise.
//!
//! Loads configuration from `~/.stepwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stepwise_core::agent::{
    AgentConfig, DEFAULT_AGENT_NAME, DEFAULT_DUPLICATE_THRESHOLD, DEFAULT_MAX_STEPS,
    DEFAULT_SPECIAL_TOOL,
};
use stepwise_core::memory::DEFAULT_MAX_MESSAGES;
use stepwise_core::provider::ToolChoice;

/// The root configuration structure.
///
/// Maps directly to `~/.stepwise/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model to request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    4096
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .finish()
    }
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,

    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Truncate tool observations to this many characters (unset = no limit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    #[serde(default = "default_special_tools")]
    pub special_tools: Vec<String>,

    /// Per-call tool timeout in seconds (unset = no timeout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
}

fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.into()
}
fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}
fn default_duplicate_threshold() -> usize {
    DEFAULT_DUPLICATE_THRESHOLD
}
fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}
fn default_special_tools() -> Vec<String> {
    vec![DEFAULT_SPECIAL_TOOL.into()]
}

impl Default for AgentSettings {
    /// Mirrors [`AgentConfig::default`].
    fn default() -> Self {
        let core = AgentConfig::default();
        Self {
            name: core.name,
            system_prompt: core.system_prompt,
            next_step_prompt: core.next_step_prompt,
            max_steps: core.max_steps,
            duplicate_threshold: core.duplicate_threshold,
            max_messages: core.max_messages,
            max_observe: core.max_observe,
            tool_choice: core.tool_choice,
            special_tools: core.special_tools,
            tool_timeout_secs: None,
        }
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Commands the shell tool may run (empty = allow all)
    #[serde(default)]
    pub shell_allowlist: Vec<String>,

    /// Directories file tools may touch (empty = anywhere)
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,

    /// Paths file tools must never touch
    #[serde(default)]
    pub forbidden_paths: Vec<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentSettings::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.stepwise/config.toml).
    ///
    /// Environment overrides:
    /// - `STEPWISE_API_KEY`, then `OPENAI_API_KEY` (only if the file has no key)
    /// - `STEPWISE_MODEL`
    /// - `STEPWISE_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("STEPWISE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("STEPWISE_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("STEPWISE_API_URL") {
            self.api_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be greater than 0".into(),
            ));
        }
        if self.agent.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_messages must be greater than 0".into(),
            ));
        }
        if self.agent.max_observe == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_observe must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The agent loop configuration this file describes.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            name: self.agent.name.clone(),
            system_prompt: self.agent.system_prompt.clone(),
            next_step_prompt: self.agent.next_step_prompt.clone(),
            max_steps: self.agent.max_steps,
            duplicate_threshold: self.agent.duplicate_threshold,
            max_messages: self.agent.max_messages,
            max_observe: self.agent.max_observe,
            tool_choice: self.agent.tool_choice,
            special_tools: self.agent.special_tools.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
        }
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn agent_defaults_match_core() {
        let core = AgentConfig::default();
        let from_default = AppConfig::default().agent_config();
        let from_toml: AppConfig = toml::from_str("[agent]\n").unwrap();
        for config in [from_default, from_toml.agent_config()] {
            assert_eq!(config.name, core.name);
            assert_eq!(config.max_steps, core.max_steps);
            assert_eq!(config.duplicate_threshold, core.duplicate_threshold);
            assert_eq!(config.max_messages, core.max_messages);
            assert_eq!(config.special_tools, core.special_tools);
            assert_eq!(config.tool_choice, core.tool_choice);
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.special_tools, vec!["terminate".to_string()]);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.agent.max_messages, config.agent.max_messages);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_step_budget_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.api_url, "https://api.openai.com/v1");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "llama3"
api_url = "http://localhost:11434/v1"

[agent]
max_steps = 7
tool_choice = "required"
max_observe = 500

[tools]
shell_allowlist = ["ls", "echo"]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "llama3");
        assert_eq!(config.agent.max_steps, 7);
        assert_eq!(config.agent.tool_choice, ToolChoice::Required);
        assert_eq!(config.tools.shell_allowlist, vec!["ls", "echo"]);

        let agent = config.agent_config();
        assert_eq!(agent.model, "llama3");
        assert_eq!(agent.max_observe, Some(500));
        assert_eq!(agent.max_steps, 7);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_tokens = \"lots\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-openai"),
            ("STEPWISE_MODEL", "gpt-4o-mini"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_url, default_api_url());
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|k| (k == "STEPWISE_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("terminate"));
    }
}
