//! Session configuration: built-in defaults, an optional JSON file, then
//! environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ollama_api::{normalize_base_url, OllamaApiConfig, DEFAULT_BASE_URL};
use serde::Deserialize;

use crate::error::ConfigError;

pub use ollama_api::config::DEFAULT_TIMEOUT;

pub const DEFAULT_MODEL: &str = "llama3.2:3b";

pub const CONFIG_PATH_ENV: &str = "VILM_CONFIG_PATH";
pub const BASE_URL_ENV: &str = "VILM_BASE_URL";
pub const TIMEOUT_ENV: &str = "VILM_TIMEOUT_SEC";
pub const DEFAULT_MODEL_ENV: &str = "VILM_DEFAULT_MODEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Normalized server base URL without a trailing slash.
    pub base_url: String,
    /// Bounds connecting, buffered requests, and idle gaps while streaming.
    pub timeout: Duration,
    pub default_model: String,
    pub user_agent: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            default_model: DEFAULT_MODEL.to_string(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    timeout_sec: Option<u64>,
    default_model: Option<String>,
}

impl SessionConfig {
    /// Defaults, then the file named by `VILM_CONFIG_PATH`, then `VILM_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = env_string_opt(CONFIG_PATH_ENV) {
            config.apply_file(Path::new(&path))?;
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overridden by one JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_file(path.as_ref())?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Transport settings derived from this configuration.
    pub fn api_config(&self) -> OllamaApiConfig {
        let config = OllamaApiConfig::new(self.base_url.clone()).with_timeout(self.timeout);
        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.clone()),
            None => config,
        }
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })?;

        if let Some(base_url) = file.base_url {
            self.base_url = parse_base_url(&base_url)?;
        }
        if let Some(seconds) = file.timeout_sec {
            self.timeout = timeout_from_secs(seconds)?;
        }
        if let Some(model) = file.default_model {
            self.default_model = parse_model(&model)?;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(base_url) = env_string_opt(BASE_URL_ENV) {
            self.base_url = parse_base_url(&base_url)?;
        }
        if let Some(raw) = env_string_opt(TIMEOUT_ENV) {
            let seconds = raw.trim().parse::<u64>().map_err(|error| {
                ConfigError::invalid("timeout_sec", format!("{raw:?} is not a whole number of seconds: {error}"))
            })?;
            self.timeout = timeout_from_secs(seconds)?;
        }
        if let Some(model) = env_string_opt(DEFAULT_MODEL_ENV) {
            self.default_model = parse_model(&model)?;
        }
        Ok(())
    }
}

fn parse_base_url(value: &str) -> Result<String, ConfigError> {
    normalize_base_url(value).map_err(|error| ConfigError::invalid("base_url", error.to_string()))
}

fn timeout_from_secs(seconds: u64) -> Result<Duration, ConfigError> {
    if seconds == 0 {
        return Err(ConfigError::invalid("timeout_sec", "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}

fn parse_model(value: &str) -> Result<String, ConfigError> {
    let model = value.trim();
    if model.is_empty() {
        return Err(ConfigError::invalid("default_model", "must not be blank"));
    }
    Ok(model.to_string())
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
