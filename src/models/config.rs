//! Application configuration data model and validation

use crate::models::burst::{RawTestParams, TestConfig};
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment keys for the burst parameters, in `RawTestParams` field order
pub const ENV_COUNT: &str = "BURST_COUNT";
pub const ENV_DELAY: &str = "BURST_DELAY_MS";
pub const ENV_DELAY_INCREMENT: &str = "BURST_DELAY_INCREMENT_MS";
pub const ENV_ENDPOINT_DELAY: &str = "BURST_ENDPOINT_DELAY";
pub const ENV_ENDPOINT_DELAY_INCREMENT: &str = "BURST_ENDPOINT_DELAY_INCREMENT";
pub const ENV_BASE_URL: &str = "BURST_BASE_URL";
pub const ENV_HEARTBEAT_URL: &str = "BURST_HEARTBEAT_URL";
pub const ENV_ENABLE_COLOR: &str = "ENABLE_COLOR";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the server exposing `/delay/{seconds}`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Explicit heartbeat WebSocket URL; derived from `base_url` when unset
    #[serde(default)]
    pub heartbeat_url: Option<String>,

    /// Unresolved burst parameters
    #[serde(default)]
    pub burst: RawTestParams,

    /// Connect timeout for the HTTP client, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_seconds: u64,

    /// Heartbeat mode run time in seconds; `None` runs until interrupted
    #[serde(default)]
    pub heartbeat_duration_seconds: Option<u64>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Emit one JSON object per line instead of formatted text
    #[serde(default)]
    pub json_output: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            heartbeat_url: None,
            burst: RawTestParams::default(),
            connect_timeout_seconds: default_connect_timeout_secs(),
            heartbeat_duration_seconds: None,
            enable_color: default_enable_color(),
            json_output: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Resolve the burst parameters
    pub fn test_config(&self) -> TestConfig {
        TestConfig::from_raw(&self.burst)
    }

    /// Validate the configuration and return any errors. Burst parameters
    /// are not checked here; the orchestrator rejects bad counts itself.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(AppError::config("Base URL cannot be empty"));
        }

        match Url::parse(&self.base_url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!(
                        "Base URL must use http or https: {}",
                        self.base_url
                    )));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid base URL '{}': {}", self.base_url, e)));
            }
        }

        if let Some(ref heartbeat_url) = self.heartbeat_url {
            match Url::parse(heartbeat_url) {
                Ok(parsed) => {
                    if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                        return Err(AppError::config(format!(
                            "Heartbeat URL must use ws or wss: {}",
                            heartbeat_url
                        )));
                    }
                }
                Err(e) => {
                    return Err(AppError::config(format!("Invalid heartbeat URL '{}': {}", heartbeat_url, e)));
                }
            }
        }

        if self.connect_timeout_seconds == 0 {
            return Err(AppError::config("Connect timeout must be greater than 0"));
        }

        if self.connect_timeout_seconds > 300 {
            return Err(AppError::config("Connect timeout cannot exceed 300 seconds"));
        }

        Ok(())
    }

    /// WebSocket URL of the heartbeat endpoint. Without an explicit URL the
    /// base URL's scheme is swapped (http -> ws, https -> wss) and the
    /// well-known path appended.
    pub fn heartbeat_endpoint(&self) -> Result<Url> {
        if let Some(ref explicit) = self.heartbeat_url {
            return Ok(Url::parse(explicit)?);
        }

        let mut url = Url::parse(&self.base_url)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| AppError::config(format!("Cannot derive heartbeat URL from {}", self.base_url)))?;
        url.set_path(crate::defaults::HEARTBEAT_PATH);
        url.set_query(None);
        Ok(url)
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        let env_params = RawTestParams {
            request_count: std::env::var(ENV_COUNT).ok(),
            launch_delay_ms: std::env::var(ENV_DELAY).ok(),
            launch_delay_increment_ms: std::env::var(ENV_DELAY_INCREMENT).ok(),
            endpoint_delay_secs: std::env::var(ENV_ENDPOINT_DELAY).ok(),
            endpoint_delay_increment_secs: std::env::var(ENV_ENDPOINT_DELAY_INCREMENT).ok(),
        };
        self.burst.merge(env_params);

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            let trimmed = base_url.trim();
            if !trimmed.is_empty() {
                self.base_url = trimmed.to_string();
            }
        }

        if let Ok(heartbeat_url) = std::env::var(ENV_HEARTBEAT_URL) {
            let trimmed = heartbeat_url.trim();
            if !trimmed.is_empty() {
                self.heartbeat_url = Some(trimmed.to_string());
            }
        }

        if let Ok(enable_color) = std::env::var(ENV_ENABLE_COLOR) {
            self.enable_color = enable_color.parse()
                .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", ENV_ENABLE_COLOR, enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_base_url() -> String {
    crate::defaults::DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.test_config(), TestConfig::default());
    }

    #[test]
    fn test_empty_base_url_invalid() {
        let config = Config { base_url: String::new(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_base_url_invalid() {
        let config = Config { base_url: "ftp://example.com".into(), ..Config::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_heartbeat_url_must_be_websocket() {
        let config = Config {
            heartbeat_url: Some("http://example.com/ws".into()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_connect_timeout_invalid() {
        let config = Config { connect_timeout_seconds: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_heartbeat_endpoint_derivation() {
        let config = Config { base_url: "https://example.com:8443/app?x=1".into(), ..Config::default() };
        let url = config.heartbeat_endpoint().unwrap();
        assert_eq!(url.as_str(), "wss://example.com:8443/ws");

        let config = Config { base_url: "http://127.0.0.1:8080".into(), ..Config::default() };
        assert_eq!(config.heartbeat_endpoint().unwrap().as_str(), "ws://127.0.0.1:8080/ws");
    }

    #[test]
    fn test_explicit_heartbeat_endpoint_wins() {
        let config = Config {
            heartbeat_url: Some("ws://other.host/live".into()),
            ..Config::default()
        };
        assert_eq!(config.heartbeat_endpoint().unwrap().as_str(), "ws://other.host/live");
    }
}
