//! HTTP Burst Tester
//!
//! Fires a configurable, staggered burst of requests at a delay-simulating
//! endpoint, measures per-request latency and HTTP/3 transport statistics,
//! and reports results as they land. A separate WebSocket heartbeat channel
//! keeps a live duplex connection and records its traffic in a bounded log.

pub mod app;
pub mod cli;
pub mod config;
pub mod client;
pub mod error;
pub mod executor;
pub mod heartbeat;
pub mod logging;
pub mod models;
pub mod output;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, TestConfig, RawTestParams, RequestTask, RequestResult, Outcome, TestSummary};
pub use executor::{Orchestrator, TestRun};
pub use heartbeat::{HeartbeatChannel, HeartbeatConfig, HeartbeatLog, LogEntry, Direction};
pub use client::{DelayEndpoint, HttpDelayClient};
pub use output::{OutputFormatter, ColoredFormatter, PlainFormatter, OutputFormatterFactory, ResultRow};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata captured by build.rs
pub fn build_info() -> String {
    let commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
    format!("{} ({}, built {})", VERSION, commit, env!("BUILD_TIME"))
}

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_REQUEST_COUNT: u32 = 5;
    pub const DEFAULT_LAUNCH_DELAY_MS: i64 = 20;
    pub const DEFAULT_LAUNCH_DELAY_INCREMENT_MS: i64 = 0;
    pub const DEFAULT_ENDPOINT_DELAY_SECS: f64 = 10.0;
    pub const DEFAULT_ENDPOINT_DELAY_INCREMENT_SECS: f64 = 0.0;

    /// Upper bound on requests in a single burst
    pub const MAX_REQUESTS: u32 = 100_000;

    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Well-known path of the duplex heartbeat endpoint
    pub const HEARTBEAT_PATH: &str = "/ws";
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
    pub const HEARTBEAT_LOG_CAPACITY: usize = 1000;
}
