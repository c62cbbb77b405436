//! Configuration loading and defaults
//!
//! This module provides:
//! - Environment variable names and defaults consumed during model selection
//! - `AgentRuntimeConfig` - Runtime configuration for agent loops
//! - `Config` - Optional application configuration loaded from config.toml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Directory name under `~/.config` for lovable-agent configuration and data
pub const CONFIG_DIR_NAME: &str = "lovable-agent";

// =============================================================================
// Environment
// =============================================================================

/// Selects the model/provider identifier
pub const MODEL_ENV: &str = "MODEL";
/// Presence routes requests through OpenRouter
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
/// Sent to OpenRouter as `HTTP-Referer`
pub const SITE_URL_ENV: &str = "SITE_URL";
/// Sent to OpenRouter as `X-Title`
pub const SITE_NAME_ENV: &str = "SITE_NAME";
/// Credentials for the direct Anthropic fallback
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub const DEFAULT_MODEL: &str = "anthropic/claude-opus-4.5";
pub const DEFAULT_SITE_URL: &str = "http://localhost:5173";
pub const DEFAULT_SITE_NAME: &str = "DeepAgents Open Lovable";

/// Output token ceiling for every model client
pub const MAX_TOKENS: u32 = 20_000;

// =============================================================================
// Runtime
// =============================================================================

/// Runtime configuration for an Agent loop.
///
/// # Example
///
/// ```
/// use lovable_agent::AgentRuntimeConfig;
///
/// let config = AgentRuntimeConfig {
///     max_retries: 3,
///     retry_base_delay_ms: 250,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRuntimeConfig {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub retry_base_delay_ms: u64,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_base_delay_ms: 500,
        }
    }
}

impl AgentRuntimeConfig {
    /// Create runtime config from application Config
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.general.max_retries,
            retry_base_delay_ms: config.general.retry_base_delay_ms,
        }
    }
}

// =============================================================================
// Config file
// =============================================================================

/// Main configuration structure loaded from config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub skills: SkillsConfig,
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Get the config directory path (~/.config/lovable-agent)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join(CONFIG_DIR_NAME))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        let runtime = AgentRuntimeConfig::default();
        Self {
            max_retries: runtime.max_retries,
            retry_base_delay_ms: runtime.retry_base_delay_ms,
        }
    }
}

/// Skills middleware settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Project skills directory (defaults to `./skills`)
    pub dir: Option<PathBuf>,
    /// Extra skills injected on every session, in addition to the built-in ones
    pub auto_inject: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.max_retries, 5);
        assert!(config.skills.dir.is_none());
        assert!(config.skills.auto_inject.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[general]
max_retries = 2

[skills]
dir = "/opt/skills"
auto_inject = ["testing"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.general.max_retries, 2);
        assert_eq!(config.general.retry_base_delay_ms, 500);
        assert_eq!(config.skills.dir, Some(PathBuf::from("/opt/skills")));
        assert_eq!(config.skills.auto_inject, vec!["testing".to_string()]);
    }

    #[test]
    fn test_runtime_from_config() {
        let mut config = Config::default();
        config.general.max_retries = 1;
        let runtime = AgentRuntimeConfig::from_config(&config);
        assert_eq!(runtime.max_retries, 1);
        assert_eq!(runtime.retry_base_delay_ms, 500);
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general]\nmax_retries = \"many\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigFile { .. }));
    }
}
