use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::github::types::{PublishMode, ReviewEvent};

/// Config file looked up in the current directory when `--config` is absent.
pub const CONFIG_FILE: &str = ".pr-reviewer.toml";

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_MODEL_API: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// GitHub rejects comment bodies above 65536 characters.
pub const DEFAULT_MAX_COMMENT_CHARS: usize = 65_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("GitHub token not found (set GITHUB_TOKEN or [github].token)")]
    MissingGitHubToken,

    #[error("Model API key not found (set GOOGLE_API_KEY or [model].api_key)")]
    MissingApiKey,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration loaded from .pr-reviewer.toml plus the environment.
///
/// Every section is optional; with no file at all the tool runs from
/// GITHUB_TOKEN and GOOGLE_API_KEY alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST API root, overridable for GitHub Enterprise.
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_GITHUB_API.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Google API key. If None, falls back to GOOGLE_API_KEY, then GEMINI_API_KEY.
    pub api_key: Option<String>,
    /// Model identifier. If None, falls back to GEMINI_MODEL, then DEFAULT_MODEL.
    pub name: Option<String>,
    pub api_base: String,
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            name: None,
            api_base: DEFAULT_MODEL_API.to_string(),
            temperature: 0.2,
            max_output_tokens: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Also send the head revision of every changed file to the model.
    pub include_file_contents: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub mode: PublishMode,
    /// Only used in review mode.
    pub event: ReviewEvent,
    pub max_comment_chars: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            mode: PublishMode::Comment,
            event: ReviewEvent::Comment,
            max_comment_chars: DEFAULT_MAX_COMMENT_CHARS,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from .pr-reviewer.toml in the
    /// current directory when no path is given. A missing default file
    /// yields the default config. Environment variables fill whatever the
    /// file left unset.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill unset credentials and the model name from an environment lookup.
    /// Values already present in the file take precedence; blank variables
    /// count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if self.github.token.is_none() {
            self.github.token = lookup("GITHUB_TOKEN");
        }
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("GOOGLE_API_KEY").or_else(|| lookup("GEMINI_API_KEY"));
        }
        if self.model.name.is_none() {
            self.model.name = lookup("GEMINI_MODEL");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish.max_comment_chars == 0 {
            return Err(ConfigError::Invalid(
                "publish.max_comment_chars must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be between 0.0 and 2.0, got {}",
                self.model.temperature
            )));
        }
        Ok(())
    }

    pub fn github_token(&self) -> Result<&str, ConfigError> {
        self.github
            .token
            .as_deref()
            .ok_or(ConfigError::MissingGitHubToken)
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.model
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn model_name(&self) -> &str {
        self.model.name.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}
