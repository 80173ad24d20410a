//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::{env::EnvManager, query::parse_query},
    error::Result,
    models::Config,
};
use std::path::PathBuf;

/// Builds the effective configuration. Precedence, lowest first:
/// defaults, `.env`, environment, `--preset`, explicit flags.
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
        }
    }

    /// Read variables from `path` instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file_from(&self.env_file, self.cli.debug)?;
        config.merge_from_env()?;

        if let Some(ref preset) = self.cli.preset {
            config.burst.merge(parse_query(preset));
        }

        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn apply_cli_overrides(&self, config: &mut Config) {
        config.burst.merge(self.cli.burst_params());

        if let Some(ref base_url) = self.cli.base_url {
            config.base_url = base_url.trim().to_string();
        }

        if let Some(ref heartbeat_url) = self.cli.heartbeat_url {
            config.heartbeat_url = Some(heartbeat_url.trim().to_string());
        }

        if let Some(timeout) = self.cli.connect_timeout {
            config.connect_timeout_seconds = timeout;
        }

        if let Some(enable_color) = self.cli.color_override() {
            config.enable_color = enable_color;
        }

        config.heartbeat_duration_seconds = self.cli.duration;
        config.json_output = self.cli.json;
        config.verbose = self.cli.verbose || self.cli.debug;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary for debug output
pub fn display_config_summary(config: &Config) -> String {
    let burst = config.test_config();
    let mut summary = Vec::new();

    summary.push(format!("Base URL: {}", config.base_url));
    match config.heartbeat_endpoint() {
        Ok(url) => summary.push(format!("Heartbeat URL: {}", url)),
        Err(e) => summary.push(format!("Heartbeat URL: invalid ({})", e.detail())),
    }
    summary.push(format!("Request Count: {}", burst.request_count));
    summary.push(format!(
        "Launch Delay: {}ms (+{}ms/req)",
        burst.initial_launch_delay_ms, burst.launch_delay_increment_ms
    ));
    summary.push(format!(
        "Endpoint Delay: {}s (+{}s/req)",
        burst.initial_endpoint_delay_secs, burst.endpoint_delay_increment_secs
    ));
    summary.push(format!("Connect Timeout: {}s", config.connect_timeout_seconds));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("JSON Output: {}", config.json_output));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
