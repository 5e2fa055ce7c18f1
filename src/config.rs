// Client configuration loading and parsing (config/client.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Environment variable overriding the backend base URL.
pub const ENV_BASE_URL: &str = "PREPDESK_API_BASE_URL";
/// Environment variable overriding the API path prefix.
pub const ENV_API_PREFIX: &str = "PREPDESK_API_PREFIX";

// ---------------------------------------------------------------------------
// Top-level assembled ClientConfig
// ---------------------------------------------------------------------------

/// Assembled client configuration.
///
/// `base_url` and `api_prefix` are normalized on load: the base URL carries
/// no trailing slash and the prefix always starts with (and never ends with)
/// a slash, so `base_url + api_prefix + path` concatenates cleanly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub timeout: Duration,
    /// Session database location. `None` means the platform data directory.
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            storage_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// client.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire client.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ClientFile {
    api: ApiSection,
    #[serde(default)]
    storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiSection {
    base_url: String,
    #[serde(default = "default_prefix")]
    prefix: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct StorageSection {
    path: Option<PathBuf>,
}

fn default_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/client.toml` relative to the
/// given `base_dir`. Fails with `FileNotFound` if the file is absent; prefer
/// `load_config()` which falls back to defaults.
pub fn load_config_from(base_dir: &Path) -> Result<ClientConfig, ConfigError> {
    let path = base_dir.join("config").join("client.toml");
    let text = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
        path: path.clone(),
    })?;
    let file: ClientFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = ClientConfig {
        base_url: file.api.base_url,
        api_prefix: file.api.prefix,
        timeout: Duration::from_secs(file.api.timeout_secs),
        storage_path: file.storage.path,
    };

    finish(config)
}

/// Convenience wrapper: loads `config/client.toml` relative to the current
/// working directory when present, falls back to built-in defaults
/// otherwise, then applies environment overrides. Always validates.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;

    let config = if cwd.join("config").join("client.toml").exists() {
        load_config_from(&cwd)?
    } else {
        ClientConfig::default()
    };

    finish(config.with_overrides(
        std::env::var(ENV_BASE_URL).ok(),
        std::env::var(ENV_API_PREFIX).ok(),
    ))
}

impl ClientConfig {
    /// Apply explicit base-URL / prefix overrides (the environment hook).
    /// Empty override values are ignored.
    pub fn with_overrides(mut self, base_url: Option<String>, prefix: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(prefix) = prefix.filter(|v| !v.is_empty()) {
            self.api_prefix = prefix;
        }
        self
    }
}

/// Normalize then validate an assembled config.
fn finish(mut config: ClientConfig) -> Result<ClientConfig, ConfigError> {
    while config.base_url.ends_with('/') {
        config.base_url.pop();
    }
    while config.api_prefix.ends_with('/') {
        config.api_prefix.pop();
    }
    validate(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &ClientConfig) -> Result<(), ConfigError> {
    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        return Err(ConfigError::ValidationError {
            field: "api.base_url".into(),
            message: format!("must start with http:// or https://, got `{}`", config.base_url),
        });
    }

    if !config.api_prefix.is_empty() && !config.api_prefix.starts_with('/') {
        return Err(ConfigError::ValidationError {
            field: "api.prefix".into(),
            message: format!("must start with `/`, got `{}`", config.api_prefix),
        });
    }

    if config.timeout.is_zero() {
        return Err(ConfigError::ValidationError {
            field: "api.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
