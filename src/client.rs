//! Client for the delay-simulating endpoint

#[cfg(test)]
mod integration_tests;

use crate::{
    error::{AppError, Result},
    models::metrics::{ResponsePayload, TransportInfo},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// Anything that can be asked to answer after a given delay.
/// The orchestrator only depends on this trait.
#[async_trait]
pub trait DelayEndpoint: Send + Sync {
    /// Issue one request asking the endpoint to wait `seconds` before
    /// answering. Non-2xx statuses, transport failures and undecodable
    /// bodies are all errors.
    async fn delay(&self, seconds: f64) -> Result<ResponsePayload>;

    /// Human-readable target, used in logs and banners
    fn describe(&self) -> String;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: crate::defaults::DEFAULT_BASE_URL.to_string(),
            connect_timeout: crate::defaults::DEFAULT_CONNECT_TIMEOUT,
            pool_max_idle_per_host: 32,
            user_agent: format!("{}/{}", crate::PKG_NAME, crate::VERSION),
        }
    }
}

impl From<&crate::models::Config> for ClientConfig {
    fn from(config: &crate::models::Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            connect_timeout: config.connect_timeout(),
            ..Self::default()
        }
    }
}

/// Wire shape of the endpoint's JSON body
#[derive(Debug, Deserialize)]
struct DelayResponseBody {
    origin: Option<String>,
    method: Option<String>,
    http3: Option<Http3Stats>,
}

#[derive(Debug, Deserialize)]
struct Http3Stats {
    protocol: Option<String>,
    rtt: Option<serde_json::Value>,
    dropped_packets: Option<u64>,
    congestion_window: Option<u64>,
    qlog_url: Option<String>,
    qlog_visualization_link: Option<String>,
}

impl From<Http3Stats> for TransportInfo {
    fn from(stats: Http3Stats) -> Self {
        let rtt = stats.rtt.and_then(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });

        Self {
            protocol: stats.protocol,
            rtt,
            dropped_packets: stats.dropped_packets,
            congestion_window_bytes: stats.congestion_window,
            qlog_url: stats.qlog_url.or(stats.qlog_visualization_link),
        }
    }
}

/// reqwest-backed client for `GET {base}/delay/{seconds}`
pub struct HttpDelayClient {
    client: Client,
    base_url: Url,
}

impl HttpDelayClient {
    /// Create a client with default settings for `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        })
    }

    /// Create a client from an explicit configuration. No request timeout is
    /// set; slow stragglers are waited out.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::config(format!("Base URL cannot carry a path: {}", config.base_url)));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// URL for a single delayed request, `{base}/delay/{seconds}`
    pub fn delay_url(&self, seconds: f64) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| AppError::config(format!("Base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .push("delay")
            .push(&format_delay(seconds));
        Ok(url)
    }
}

#[async_trait]
impl DelayEndpoint for HttpDelayClient {
    async fn delay(&self, seconds: f64) -> Result<ResponsePayload> {
        let url = self.delay_url(seconds)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http_request(status_message(status)));
        }

        let http_version = format!("{:?}", response.version());
        let body: DelayResponseBody = response.json().await?;

        Ok(ResponsePayload {
            origin: body.origin,
            method: body.method,
            http_version: Some(http_version),
            transport: body.http3.map(TransportInfo::from),
        })
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}

/// "HTTP 503: Service Unavailable"
pub fn status_message(status: StatusCode) -> String {
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}

/// Render a delay the way the endpoint path expects: "10", "0.5", "2.25"
pub fn format_delay(seconds: f64) -> String {
    let clamped = if seconds > 0.0 { seconds } else { 0.0 };
    format!("{}", clamped)
}
