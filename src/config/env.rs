//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::burst::{parse_float_prefix, parse_int_prefix};
use crate::models::config::{
    ENV_BASE_URL, ENV_COUNT, ENV_DELAY, ENV_DELAY_INCREMENT, ENV_ENABLE_COLOR, ENV_ENDPOINT_DELAY,
    ENV_ENDPOINT_DELAY_INCREMENT, ENV_HEARTBEAT_URL,
};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load `.env` from the current directory if it exists. Variables
    /// already set in the environment are not overwritten.
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# HTTP Burst Tester Configuration
#
# Values here are defaults; environment variables and command-line
# flags override them.

# Server exposing /delay/{seconds}
# BURST_BASE_URL=http://localhost:8080

# Heartbeat WebSocket endpoint (defaults to the base URL with ws:// and /ws)
# BURST_HEARTBEAT_URL=ws://localhost:8080/ws

# Number of requests per burst (1-100000)
# BURST_COUNT=5

# Pause after the first dispatch, and its per-request increment, in ms
# BURST_DELAY_MS=20
# BURST_DELAY_INCREMENT_MS=0

# Simulated endpoint delay and its per-request increment, in seconds
# BURST_ENDPOINT_DELAY=10
# BURST_ENDPOINT_DELAY_INCREMENT=0

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Example: fifty parallel requests with delays growing 0.1s each
# BURST_COUNT=50
# BURST_DELAY_MS=0
# BURST_ENDPOINT_DELAY=1
# BURST_ENDPOINT_DELAY_INCREMENT=0.1
"#.to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate one environment variable. Burst values are checked the way
    /// they will be resolved: a value that would silently fall back to the
    /// default is reported.
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            ENV_COUNT => {
                let count = parse_int_prefix(value)
                    .ok_or_else(|| AppError::config(format!("Invalid {} value '{}'", key, value)))?;
                if count < 1 || count > crate::defaults::MAX_REQUESTS as i64 {
                    return Err(AppError::config(format!(
                        "{} must be between 1 and {}, got: {}",
                        key,
                        crate::defaults::MAX_REQUESTS,
                        count
                    )));
                }
            }
            ENV_DELAY | ENV_DELAY_INCREMENT => {
                parse_int_prefix(value)
                    .ok_or_else(|| AppError::config(format!("Invalid {} value '{}'", key, value)))?;
            }
            ENV_ENDPOINT_DELAY | ENV_ENDPOINT_DELAY_INCREMENT => {
                parse_float_prefix(value)
                    .ok_or_else(|| AppError::config(format!("Invalid {} value '{}'", key, value)))?;
            }
            ENV_BASE_URL => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", key, value, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("{} must use http or https: {}", key, value)));
                }
            }
            ENV_HEARTBEAT_URL => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", key, value, e)))?;
                if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                    return Err(AppError::config(format!("{} must use ws or wss: {}", key, value)));
                }
            }
            ENV_ENABLE_COLOR => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// All supported environment variables with descriptions and examples
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            (ENV_BASE_URL, "Server exposing /delay/{seconds}", "http://localhost:8080"),
            (ENV_HEARTBEAT_URL, "Heartbeat WebSocket URL", "ws://localhost:8080/ws"),
            (ENV_COUNT, "Requests per burst (1-100000)", "5"),
            (ENV_DELAY, "Initial launch pause in ms", "20"),
            (ENV_DELAY_INCREMENT, "Launch pause increment in ms", "0"),
            (ENV_ENDPOINT_DELAY, "Initial simulated delay in seconds", "10"),
            (ENV_ENDPOINT_DELAY_INCREMENT, "Simulated delay increment in seconds", "0.5"),
            (ENV_ENABLE_COLOR, "Enable colored output", "true"),
        ]
    }

    /// Environment variable help text
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<32} {}\n", var, description));
            help.push_str(&format!("  {:<32} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. --preset query string\n");
        help.push_str("  3. Environment variables\n");
        help.push_str("  4. .env file values\n");
        help.push_str("  5. Default values\n");

        help
    }

    /// Validate all currently set environment variables, one message per problem
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value).err().map(|e| e.detail().to_string())
            })
            .collect()
    }
}
