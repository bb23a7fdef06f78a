//! Runtime settings: YAML file plus `TASKFLOW_*` environment overrides.
//!
//! # Invariants
//! - Every field has a default; an absent file yields `Settings::default()`.
//! - Environment overrides are applied after the file and before validation.
//! - A missing model API key means no language model is configured.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "TASKFLOW_DB_PATH";
pub const ENV_LOG_DIR: &str = "TASKFLOW_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "TASKFLOW_LOG_LEVEL";
pub const ENV_MODEL_API_KEY: &str = "TASKFLOW_MODEL_API_KEY";
pub const ENV_MODEL_API_BASE: &str = "TASKFLOW_MODEL_API_BASE";
pub const ENV_MODEL_NAME: &str = "TASKFLOW_MODEL_NAME";
pub const ENV_MODEL_TIMEOUT_MS: &str = "TASKFLOW_MODEL_TIMEOUT_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {name}: `{value}`")]
    Env { name: &'static str, value: String },
    #[error("settings validation failed: {0}")]
    Settings(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub model: ModelSettings,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("taskflow.sqlite3"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`. Empty uses the build default.
    pub level: String,
    pub dir: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: String::new(),
            dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub name: String,
    pub timeout_ms: u64,
    /// Summarize action results with a second model call.
    pub narrate: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            name: "gemini-2.0-flash".to_string(),
            timeout_ms: 20_000,
            narrate: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub list_limit: u32,
    pub stats_project_limit: u32,
    pub search_top_k: u32,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            list_limit: 10,
            stats_project_limit: 5,
            search_top_k: 5,
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// File (when given), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies `TASKFLOW_*` overrides from `lookup`. Blank values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_DB_PATH) {
            self.database.path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_LOG_DIR) {
            self.logging.dir = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_LOG_LEVEL) {
            self.logging.level = value.trim().to_string();
        }
        if let Some(value) = get(ENV_MODEL_API_KEY) {
            self.model.api_key = Some(value.trim().to_string());
        }
        if let Some(value) = get(ENV_MODEL_API_BASE) {
            self.model.api_base = value.trim().to_string();
        }
        if let Some(value) = get(ENV_MODEL_NAME) {
            self.model.name = value.trim().to_string();
        }
        if let Some(value) = get(ENV_MODEL_TIMEOUT_MS) {
            self.model.timeout_ms = value.trim().parse().map_err(|_| ConfigError::Env {
                name: ENV_MODEL_TIMEOUT_MS,
                value: value.clone(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.timeout_ms == 0 {
            return Err(ConfigError::Settings(
                "model.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Settings("model.name must not be blank".to_string()));
        }
        if self.model.api_base.trim().is_empty() {
            return Err(ConfigError::Settings(
                "model.api_base must not be blank".to_string(),
            ));
        }
        for (name, value) in [
            ("assistant.list_limit", self.assistant.list_limit),
            ("assistant.stats_project_limit", self.assistant.stats_project_limit),
            ("assistant.search_top_k", self.assistant.search_top_k),
        ] {
            if value == 0 {
                return Err(ConfigError::Settings(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if !self.logging.level.is_empty() && crate::logging::parse_level(&self.logging.level).is_none()
        {
            return Err(ConfigError::Settings(format!(
                "logging.level `{}` is not a log level",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// API key when a language model is configured.
    pub fn model_api_key(&self) -> Option<&str> {
        self.model
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
