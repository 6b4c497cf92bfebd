//! Runtime configuration: an optional JSON file plus `LABNOTE_*`
//! environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assistant::{AssistantConfig, DEFAULT_TIMEOUT};
use crate::cache::CacheConfig;
use crate::model::AssistantSettings;

pub const ENV_ENDPOINT: &str = "LABNOTE_AI_ENDPOINT";
pub const ENV_API_KEY: &str = "LABNOTE_AI_KEY";
pub const ENV_MODEL: &str = "LABNOTE_AI_MODEL";

const APP_DIR: &str = "labnote";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Values here win over the assistant settings stored with the lab data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabConfig {
    pub data_dir: Option<PathBuf>,
    pub cache: CacheConfig,
    pub assistant: AssistantOverrides,
}

impl LabConfig {
    /// Reads `path` if given, otherwise the default config file if it
    /// exists, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => match default_config_path().filter(|path| path.is_file()) {
                Some(path) => Self::from_path(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Applies overrides found through `lookup`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value: &String| !value.trim().is_empty());
        if let Some(endpoint) = read(ENV_ENDPOINT) {
            self.assistant.endpoint = Some(endpoint);
        }
        if let Some(key) = read(ENV_API_KEY) {
            self.assistant.api_key = Some(key);
        }
        if let Some(model) = read(ENV_MODEL) {
            self.assistant.model = Some(model);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assistant.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "assistant.timeoutSecs",
                reason: "must be > 0".to_owned(),
            });
        }
        if let Some(endpoint) = &self.assistant.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue {
                field: "assistant.endpoint",
                reason: format!("{endpoint} is not an http(s) URL"),
            });
        }
        Ok(())
    }

    /// Explicit data directory, else the platform data directory, else a
    /// directory next to the working directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("labnote-data"))
        })
    }

    pub fn assistant_config(&self, settings: &AssistantSettings) -> AssistantConfig {
        let mut config = AssistantConfig::from_settings(settings);
        let overrides = &self.assistant;
        if let Some(endpoint) = &overrides.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(key) = &overrides.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(model) = &overrides.model {
            config.model = model.clone();
        }
        config.timeout = overrides
            .timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
        config
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
}
