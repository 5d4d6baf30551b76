//! Embedding Service Configuration
//!
//! The HTTP server and the shared model settings come from a TOML file.
//! The stdio embedder takes its model and sentinel from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::ModelsConfig;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "EMBEDDING_SERVER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Model identifier for the stdio embedder
pub const MODEL_NAME_ENV: &str = "MODEL_NAME";
/// Frame sentinel for the stdio embedder
pub const SENTINEL_ENV: &str = "COMMAND_SEP";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {name} is not set")]
    MissingEnv { name: &'static str },

    #[error("failed to read config file {path}: {error}")]
    Read { path: String, error: std::io::Error },

    #[error("failed to parse config file {path}: {error}")]
    Parse { path: String, error: toml::de::Error },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub bind_address: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|error| ConfigError::Read {
            path: path_str.clone(),
            error,
        })?;
        toml::from_str(&content).map_err(|error| ConfigError::Parse { path: path_str, error })
    }

    /// Load from `$EMBEDDING_SERVER_CONFIG` or `config.toml`. A missing
    /// default file means built-in defaults; an explicitly named file must
    /// exist.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Startup settings of the stdio embedder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioConfig {
    pub model_name: String,
    pub sentinel: String,
}

impl StdioConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv { name })
        };
        Ok(Self {
            model_name: required(MODEL_NAME_ENV)?,
            sentinel: required(SENTINEL_ENV)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let config: ServerConfig = toml::from_str(
            r#"
            [network]
            bind_address = "127.0.0.1:9000"

            [models]
            models_dir = "/srv/models"
            intra_threads = 2
            max_sequence_length = 128
            normalize = false

            [monitoring]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.bind_address, "127.0.0.1:9000");
        assert_eq!(config.models.models_dir, "/srv/models");
        assert_eq!(config.models.intra_threads, 2);
        assert_eq!(config.models.max_sequence_length, 128);
        assert!(!config.models.normalize);
        assert_eq!(config.monitoring.log_level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.network.bind_address, "0.0.0.0:8080");
        assert_eq!(config.models.models_dir, "models");
        assert_eq!(config.monitoring.log_level, "info");
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = ServerConfig::from_file("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_stdio_config_from_env() {
        let config = StdioConfig::from_lookup(lookup(&[
            (MODEL_NAME_ENV, "all-MiniLM-L6-v2"),
            (SENTINEL_ENV, "<<END>>"),
        ]))
        .unwrap();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.sentinel, "<<END>>");
    }

    #[test]
    fn test_stdio_config_requires_both_vars() {
        let err = StdioConfig::from_lookup(lookup(&[(SENTINEL_ENV, "<<END>>")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { name: MODEL_NAME_ENV }));

        let err = StdioConfig::from_lookup(lookup(&[(MODEL_NAME_ENV, "m")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { name: SENTINEL_ENV }));

        let err = StdioConfig::from_lookup(lookup(&[(MODEL_NAME_ENV, "m"), (SENTINEL_ENV, "")])).unwrap_err();
        assert_eq!(err.to_string(), "required environment variable COMMAND_SEP is not set");
    }
}
