//! Command-line interface

use clap::Parser;

/// HTTP Burst Tester - fire a staggered burst of requests at a delay endpoint
/// and watch them land, or keep a WebSocket heartbeat running
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "hbt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of requests in the burst (1-100000)
    #[arg(short = 'n', long, value_name = "N")]
    pub count: Option<String>,

    /// Pause after the first dispatch, in milliseconds
    #[arg(short = 'd', long, value_name = "MS", allow_hyphen_values = true)]
    pub delay: Option<String>,

    /// Added to the pause after each further dispatch, in milliseconds
    #[arg(long = "delay-inc", value_name = "MS", allow_hyphen_values = true)]
    pub delay_inc: Option<String>,

    /// Delay the endpoint simulates for the first request, in seconds
    #[arg(short = 'e', long = "endpoint-delay", value_name = "SECS", allow_hyphen_values = true)]
    pub endpoint_delay: Option<String>,

    /// Added to the simulated delay for each further request, in seconds
    #[arg(long = "endpoint-inc", value_name = "SECS", allow_hyphen_values = true)]
    pub endpoint_inc: Option<String>,

    /// Load burst parameters from a preset such as "count=20&delay=50"
    #[arg(long, value_name = "QUERY")]
    pub preset: Option<String>,

    /// Base URL of the server exposing /delay/{seconds}
    #[arg(short = 'u', long = "base-url", value_name = "URL", env = "BURST_BASE_URL")]
    pub base_url: Option<String>,

    /// Heartbeat WebSocket URL (derived from the base URL when omitted)
    #[arg(long = "heartbeat-url", value_name = "URL", env = "BURST_HEARTBEAT_URL")]
    pub heartbeat_url: Option<String>,

    /// Run the heartbeat channel instead of a burst
    #[arg(long)]
    pub heartbeat: bool,

    /// Stop the heartbeat channel after this many seconds
    #[arg(long, value_name = "SECS", requires = "heartbeat", value_parser = parse_seconds)]
    pub duration: Option<u64>,

    /// HTTP connect timeout in seconds
    #[arg(long = "connect-timeout", value_name = "SECS", value_parser = parse_seconds)]
    pub connect_timeout: Option<u64>,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print one JSON object per line instead of formatted text
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Print an example .env file and exit
    #[arg(long)]
    pub env_example: bool,
}

impl Cli {
    /// Check if colors should be enabled; `None` leaves the decision to the
    /// configuration
    pub fn color_override(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }

    /// Whether colors should be used given the configured preference
    pub fn use_colors(&self, configured: bool) -> bool {
        match self.color_override() {
            Some(forced) => forced,
            None => configured && supports_color(),
        }
    }

    /// Burst parameters given as flags
    pub fn burst_params(&self) -> crate::models::RawTestParams {
        crate::models::RawTestParams {
            request_count: self.count.clone(),
            launch_delay_ms: self.delay.clone(),
            launch_delay_increment_ms: self.delay_inc.clone(),
            endpoint_delay_secs: self.endpoint_delay.clone(),
            endpoint_delay_increment_secs: self.endpoint_inc.clone(),
        }
    }
}

/// Parse a positive number of seconds, at most 86400
fn parse_seconds(s: &str) -> Result<u64, String> {
    if s.starts_with('+') {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 86_400 {
                Err("Duration cannot exceed 86400 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
