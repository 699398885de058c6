//! Configuration loading, validation, and management for roundtable.
//!
//! Loads configuration from `~/.roundtable/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.roundtable/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundtableConfig {
    /// Model, sampling and round limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Batch execution settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Pre-round planning
    #[serde(default)]
    pub planning: PlanningConfig,

    /// Per-model prompt rewriting
    #[serde(default)]
    pub model_quirks: ModelQuirksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Rounds per session; the last one is run with tools withdrawn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_iterations() -> usize {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            max_iterations: default_max_iterations(),
        }
    }
}

/// How a batch of independent tasks is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_execution_mode")]
    pub mode: ExecutionMode,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_execution_mode() -> ExecutionMode {
    ExecutionMode::Concurrent
}
fn default_max_concurrency() -> usize {
    10
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: default_execution_mode(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Name given to the structured-output schema
    #[serde(default = "default_planning_schema_name")]
    pub schema_name: String,

    /// The single free-text field the planning output carries
    #[serde(default = "default_planning_field")]
    pub field: String,

    /// Field description shown to the model
    #[serde(default = "default_planning_description")]
    pub description: String,
}

fn default_planning_schema_name() -> String {
    "plan".into()
}
fn default_planning_field() -> String {
    "plan".into()
}
fn default_planning_description() -> String {
    "Think step by step about what to do next. Describe which tools to call and why, \
     or explain why no tool is needed."
        .into()
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            schema_name: default_planning_schema_name(),
            field: default_planning_field(),
            description: default_planning_description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelQuirksConfig {
    /// Case-insensitive substrings of model ids that need explicit
    /// tool-call formatting
    #[serde(default)]
    pub models: Vec<String>,

    /// Appended to the latest user message on a forced first round
    #[serde(default = "default_forced_tool_instruction")]
    pub forced_tool_instruction: String,

    /// Sent as an assistant message on the last round
    #[serde(default = "default_no_tools_instruction")]
    pub no_tools_instruction: String,
}

fn default_forced_tool_instruction() -> String {
    "\n\nRespond only with a tool call in the required function-call format.".into()
}
fn default_no_tools_instruction() -> String {
    "I must not call any more tools. I will answer directly using the information gathered so far."
        .into()
}

impl Default for ModelQuirksConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            forced_tool_instruction: default_forced_tool_instruction(),
            no_tools_instruction: default_no_tools_instruction(),
        }
    }
}

impl RoundtableConfig {
    /// Load configuration from the default path (~/.roundtable/config.toml).
    ///
    /// Environment variables override file values:
    /// - `ROUNDTABLE_MODEL`
    /// - `ROUNDTABLE_MAX_ITERATIONS`
    /// - `ROUNDTABLE_MAX_CONCURRENCY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
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

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(model) = std::env::var("ROUNDTABLE_MODEL") {
            self.agent.model = model;
        }

        if let Ok(raw) = std::env::var("ROUNDTABLE_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_env("ROUNDTABLE_MAX_ITERATIONS", &raw)?;
        }

        if let Ok(raw) = std::env::var("ROUNDTABLE_MAX_CONCURRENCY") {
            self.executor.max_concurrency = parse_env("ROUNDTABLE_MAX_CONCURRENCY", &raw)?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".roundtable")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.executor.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "executor.max_concurrency must be at least 1".into(),
            ));
        }

        if self.planning.enabled && self.planning.field.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "planning.field must not be empty when planning is enabled".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Render this config as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::ValidationError(format!("{name}={raw:?}: {e}")))
}

/// Get the user's home directory.
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
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = RoundtableConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.executor.max_concurrency, 10);
        assert_eq!(config.executor.mode, ExecutionMode::Concurrent);
        assert!(!config.planning.enabled);
        assert!(config.model_quirks.models.is_empty());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = RoundtableConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RoundtableConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.model, config.agent.model);
        assert_eq!(parsed.executor.max_concurrency, config.executor.max_concurrency);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = RoundtableConfig::default();
        config.agent.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = RoundtableConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = RoundtableConfig::default();
        config.executor.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn planning_requires_field_when_enabled() {
        let mut config = RoundtableConfig::default();
        config.planning.enabled = true;
        config.planning.field = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = RoundtableConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().agent.model, "gpt-4o");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = RoundtableConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("max_concurrency"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[agent]
model = "mistral-large"
max_iterations = 4

[executor]
mode = "sequential"

[planning]
enabled = true

[model_quirks]
models = ["mistral"]
"#
        )
        .unwrap();

        let config = RoundtableConfig::load_from(file.path()).unwrap();
        assert_eq!(config.agent.model, "mistral-large");
        assert_eq!(config.agent.max_iterations, 4);
        assert!((config.agent.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.executor.mode, ExecutionMode::Sequential);
        assert_eq!(config.executor.max_concurrency, 10);
        assert!(config.planning.enabled);
        assert_eq!(config.planning.field, "plan");
        assert_eq!(config.model_quirks.models, vec!["mistral".to_string()]);
        assert!(!config.model_quirks.forced_tool_instruction.is_empty());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[agent\nmodel = ").unwrap();
        let err = RoundtableConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[executor]\nmax_concurrency = 0\n").unwrap();
        let err = RoundtableConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn parse_env_reports_variable_name() {
        let err = parse_env::<usize>("ROUNDTABLE_MAX_ITERATIONS", "many").unwrap_err();
        assert!(err.to_string().contains("ROUNDTABLE_MAX_ITERATIONS"));
        assert_eq!(parse_env::<usize>("X", " 3 ").unwrap(), 3);
    }
}
