//! Configuration loading for the Tunedeck console client.
//!
//! All fields are required unless explicitly marked optional. Cache and
//! mutation sections fall back to the documented query defaults when absent.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{MutationPolicy, QueryPolicy};

pub const CONFIG_ENV_VAR: &str = "TUNEDECK_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub token_path: PathBuf,
    pub download_dir: PathBuf,
    pub locale: String,
    pub log_format: LogFormat,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub mutations: MutationSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub stale_time_ms: u64,
    pub ttl_ms: u64,
    pub retry: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let policy = QueryPolicy::default();
        Self {
            stale_time_ms: policy.stale_time.as_millis() as u64,
            ttl_ms: policy.ttl.as_millis() as u64,
            retry: policy.retry,
            retry_base_ms: policy.backoff.base.as_millis() as u64,
            retry_max_ms: policy.backoff.max.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MutationSettings {
    pub retry: u32,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            retry: MutationPolicy::default().retry,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TUNEDECK_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConsoleConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ConsoleConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.token_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "token_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.download_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "download_dir",
                reason: "must not be empty".to_string(),
            });
        }
        if self.locale.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "locale",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.ttl_ms < self.cache.stale_time_ms {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_ms",
                reason: "must be >= cache.stale_time_ms".to_string(),
            });
        }
        if self.cache.retry_base_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.retry_base_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.retry_max_ms < self.cache.retry_base_ms {
            return Err(ConfigError::InvalidValue {
                field: "cache.retry_max_ms",
                reason: "must be >= cache.retry_base_ms".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn query_policy(&self) -> QueryPolicy {
        QueryPolicy::new()
            .with_stale_time(Duration::from_millis(self.cache.stale_time_ms))
            .with_ttl(Duration::from_millis(self.cache.ttl_ms))
            .with_retry(self.cache.retry)
            .with_backoff(
                Duration::from_millis(self.cache.retry_base_ms),
                Duration::from_millis(self.cache.retry_max_ms),
            )
    }

    pub fn mutation_policy(&self) -> MutationPolicy {
        MutationPolicy::new().with_retry(self.mutations.retry)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
