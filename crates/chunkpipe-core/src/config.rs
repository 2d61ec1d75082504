//! Process configuration
//!
//! Endpoint and credential for the completion service come from the
//! environment. Their absence is not an error here: the API client reports
//! a configuration error on first use.

use std::path::PathBuf;
use std::time::Duration;

/// Env var holding the chat-completion endpoint URL
pub const ENV_API_URL: &str = "CHUNKPIPE_API_URL";
/// Env var holding the bearer credential
pub const ENV_API_KEY: &str = "CHUNKPIPE_API_KEY";
/// Env var overriding the per-request timeout (seconds)
pub const ENV_TIMEOUT_SECS: &str = "CHUNKPIPE_TIMEOUT_SECS";
/// Env var bounding 429 retries; `unlimited` disables the bound
pub const ENV_MAX_RATE_LIMIT_RETRIES: &str = "CHUNKPIPE_MAX_RATE_LIMIT_RETRIES";
/// Env var overriding the model configuration file
pub const ENV_MODELS_PATH: &str = "CHUNKPIPE_MODELS";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default number of 429 retries before giving up
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 10;

/// Connection settings for the remote completion service
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Full URL of the chat-completions endpoint
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// `None` retries 429 responses forever
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_rate_limit_retries: Some(DEFAULT_MAX_RATE_LIMIT_RETRIES),
        }
    }
}

impl ApiConfig {
    /// Create a config for an endpoint and key, other settings default
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Read the config from `CHUNKPIPE_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self {
            endpoint: non_empty_var(ENV_API_URL),
            api_key: non_empty_var(ENV_API_KEY),
            ..Default::default()
        };

        if let Some(raw) = non_empty_var(ENV_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid {}={}", ENV_TIMEOUT_SECS, raw),
            }
        }

        if let Some(raw) = non_empty_var(ENV_MAX_RATE_LIMIT_RETRIES) {
            match parse_retry_limit(&raw) {
                Some(limit) => config.max_rate_limit_retries = limit,
                None => log::warn!("Ignoring invalid {}={}", ENV_MAX_RATE_LIMIT_RETRIES, raw),
            }
        }

        config
    }

    /// Check if endpoint and credential are both present
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }
}

/// Parse a retry bound: a number, or `unlimited` for no bound
fn parse_retry_limit(raw: &str) -> Option<Option<u32>> {
    match raw.trim().to_lowercase().as_str() {
        "unlimited" | "none" | "infinite" => Some(None),
        other => other.parse::<u32>().ok().map(Some),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Get the model configuration file path
/// Priority: CHUNKPIPE_MODELS env var > `<config dir>/chunkpipe/models.json`
pub fn get_models_path() -> PathBuf {
    if let Some(path) = non_empty_var(ENV_MODELS_PATH) {
        return expand_path(&path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chunkpipe")
        .join("models.json")
}
