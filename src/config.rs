use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use roomshare_core::ClientConfig;

const DEFAULT_TOKEN: &str = "mock";
const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_BASE_URL: &str = "/api/v1";
const DEFAULT_DEVICE: &str = "roomshare-device";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Bearer token presented to the room service
    pub token: ConfigValue<String>,
    /// Service origin, e.g. "http://localhost:3000"
    pub origin: ConfigValue<String>,
    /// Path prefix of every endpoint
    pub base_url: ConfigValue<String>,
    /// Name this machine joins rooms as
    pub device_name: ConfigValue<String>,
    /// Per-request deadline in seconds (0 disables it)
    pub timeout_secs: ConfigValue<u64>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    token: Option<String>,
    origin: Option<String>,
    base_url: Option<String>,
    device_name: Option<String>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], reading environment variables through `env`.
    pub fn load_with_env(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let default_device = env("HOSTNAME")
            .or_else(|| env("COMPUTERNAME"))
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEVICE.to_string());

        // Start with defaults
        let mut token = ConfigValue::new(DEFAULT_TOKEN.to_string(), ConfigSource::Default);
        let mut origin = ConfigValue::new(DEFAULT_ORIGIN.to_string(), ConfigSource::Default);
        let mut base_url = ConfigValue::new(DEFAULT_BASE_URL.to_string(), ConfigSource::Default);
        let mut device_name = ConfigValue::new(default_device, ConfigSource::Default);
        let mut timeout_secs = ConfigValue::new(DEFAULT_TIMEOUT_SECS, ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(v) = file_config.token {
                token = ConfigValue::new(v, ConfigSource::File);
            }
            if let Some(v) = file_config.origin {
                origin = ConfigValue::new(v, ConfigSource::File);
            }
            if let Some(v) = file_config.base_url {
                base_url = ConfigValue::new(v, ConfigSource::File);
            }
            if let Some(v) = file_config.device_name {
                device_name = ConfigValue::new(v, ConfigSource::File);
            }
            if let Some(v) = file_config.timeout_secs {
                timeout_secs = ConfigValue::new(v, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Some(v) = env("ROOMSHARE_TOKEN") {
            token = ConfigValue::new(v, ConfigSource::Environment);
        }
        if let Some(v) = env("ROOMSHARE_ORIGIN") {
            origin = ConfigValue::new(v, ConfigSource::Environment);
        }
        if let Some(v) = env("ROOMSHARE_BASE_URL") {
            base_url = ConfigValue::new(v, ConfigSource::Environment);
        }
        if let Some(v) = env("ROOMSHARE_DEVICE") {
            device_name = ConfigValue::new(v, ConfigSource::Environment);
        }

        Ok(Self {
            token,
            origin,
            base_url,
            device_name,
            timeout_secs,
            config_file,
        })
    }

    /// Session configuration for the room service.
    pub fn client_config(&self) -> ClientConfig {
        let timeout = match self.timeout_secs.value {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ClientConfig::new(
            self.token.value.clone(),
            self.origin.value.clone(),
            self.base_url.value.clone(),
        )
        .with_request_timeout(timeout)
    }

    /// Token with all but the first two characters hidden.
    pub fn masked_token(&self) -> String {
        let token = &self.token.value;
        let shown: String = token.chars().take(2).collect();
        let hidden = token.chars().count().saturating_sub(2);
        format!("{}{}", shown, "*".repeat(hidden))
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/roomshare/
    /// - macOS: ~/Library/Application Support/roomshare/
    /// - Windows: %APPDATA%/roomshare/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roomshare")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
