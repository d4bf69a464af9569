//! Configuration loading, validation, and management for Unison.
//!
//! Loads configuration from `~/.unison/config.toml` with environment
//! variable overrides. Validates all settings at startup. Clan definitions
//! live in their own TOML files, see [`ClanFile`].

mod clan;

pub use clan::{ClanFile, MemberConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.unison/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model endpoint
    #[serde(default)]
    pub model: ModelConfig,

    /// Execution loop defaults
    #[serde(default)]
    pub agent: AgentConfig,

    /// External tool servers
    #[serde(default)]
    pub mcp: McpConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model turns per task before the loop gives up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Directory holding one `<identity>.json` transcript per agent
    #[serde(default = "default_history_folder")]
    pub history_folder: PathBuf,

    /// Where `pass_result` writes the final artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,

    /// Whether a standalone agent may prompt on stdin
    #[serde(default = "default_true")]
    pub ask_user: bool,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_history_folder() -> PathBuf {
    PathBuf::from("history")
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_folder: default_history_folder(),
            output_file: None,
            ask_user: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    /// Path to a JSON file of the form `{"mcpServers": {...}}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.unison/config.toml).
    ///
    /// Also checks environment variables:
    /// - `UNISON_API_KEY`, then `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`,
    ///   only when the file sets no `api_key`
    /// - `UNISON_MODEL`, which always wins over the file
    /// - `UNISON_API_URL`, which always wins over the file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// [`AppConfig::load_from`] followed by the environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env();
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

    fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = var("UNISON_API_KEY")
                .or_else(|| var("OPENROUTER_API_KEY"))
                .or_else(|| var("OPENAI_API_KEY"));
        }

        if let Some(model) = var("UNISON_MODEL") {
            self.model.model = model;
        }

        if let Some(url) = var("UNISON_API_URL") {
            self.model.api_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".unison")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.model.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("model.api_url must not be empty".into()));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
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

    #[test]
    fn env_key_fills_in_only_when_file_has_none() {
        let vars = |name: &str| match name {
            "OPENROUTER_API_KEY" => Some("sk-or".to_string()),
            "OPENAI_API_KEY" => Some("sk-openai".to_string()),
            "UNISON_MODEL" => Some("env-model".to_string()),
            _ => None,
        };

        let mut config = AppConfig::default();
        config.apply_vars(vars);
        assert_eq!(config.model.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.model.model, "env-model");

        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-file".into());
        config.apply_vars(vars);
        assert_eq!(config.model.api_key.as_deref(), Some("sk-file"));

        let mut config = AppConfig::default();
        config.apply_vars(|name| (name == "UNISON_API_KEY" || name == "OPENAI_API_KEY").then(|| name.to_lowercase()));
        assert_eq!(config.model.api_key.as_deref(), Some("unison_api_key"));
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.history_folder, PathBuf::from("history"));
        assert!(config.agent.output_file.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.model, config.model.model);
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.model.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model.api_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[agent]\nmax_iterations = 3\noutput_file = \"out/result.txt\"\n\n[mcp]\nconfig_path = \"mcp.json\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.output_file, Some(PathBuf::from("out/result.txt")));
        assert_eq!(config.mcp.config_path, Some(PathBuf::from("mcp.json")));
        assert_eq!(config.model.max_tokens, 4096);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nmax_iterations = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-secret-value".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_iterations = 10"));
        assert!(toml_str.contains("openrouter"));
        assert!(!toml_str.contains("api_key"));
    }
}
