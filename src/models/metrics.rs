//! Per-request results and the aggregate run summary

use crate::types::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport statistics reported by an HTTP/3-instrumented endpoint.
/// Every field is optional; servers fill in what they track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportInfo {
    /// Protocol label, e.g. "HTTP/3"
    pub protocol: Option<String>,
    /// Round-trip time as reported, e.g. "31.2ms"
    pub rtt: Option<String>,
    pub dropped_packets: Option<u64>,
    pub congestion_window_bytes: Option<u64>,
    /// Link to the connection's qlog trace or its visualization
    pub qlog_url: Option<String>,
}

/// Body fields of a successful delay-endpoint response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Client address as seen by the server
    pub origin: Option<String>,
    /// Request method echoed by the server
    pub method: Option<String>,
    /// HTTP version the client negotiated, e.g. "HTTP/1.1"
    pub http_version: Option<String>,
    /// Present only when the server answered over the instrumented transport
    pub transport: Option<TransportInfo>,
}

/// Settled state of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(ResponsePayload),
    Failure { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn status(&self) -> RequestStatus {
        match self {
            Outcome::Success(_) => RequestStatus::Success,
            Outcome::Failure { .. } => RequestStatus::Failed,
        }
    }
}

/// Result of one request, emitted as soon as it settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResult {
    /// 1-based submission index, not completion order
    pub index: u32,
    /// Client-side wall time from launch to settle
    pub duration_ms: f64,
    /// Delay the endpoint was asked to simulate
    pub requested_delay_secs: f64,
    pub outcome: Outcome,
    /// When the request settled
    pub completed_at: DateTime<Utc>,
}

impl RequestResult {
    pub fn new(index: u32, duration: Duration, requested_delay_secs: f64, outcome: Outcome) -> Self {
        Self {
            index,
            duration_ms: duration.as_secs_f64() * 1000.0,
            requested_delay_secs,
            outcome,
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn duration(&self) -> Duration {
        millis_to_duration(self.duration_ms)
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failure { message } => Some(message),
            Outcome::Success(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&ResponsePayload> {
        match &self.outcome {
            Outcome::Success(payload) => Some(payload),
            Outcome::Failure { .. } => None,
        }
    }
}

/// Aggregate statistics for a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    /// Wall time from first dispatch to last settle
    pub total_duration_ms: f64,
    pub success_count: u32,
    pub request_count: u32,
    /// `success_count / request_count * 100`, rounded to one decimal
    pub success_rate_percent: f64,
}

impl TestSummary {
    pub fn new(total_duration: Duration, success_count: u32, request_count: u32) -> Self {
        let success_rate_percent = if request_count > 0 {
            round_one_decimal(success_count as f64 / request_count as f64 * 100.0)
        } else {
            0.0
        };

        Self {
            total_duration_ms: total_duration.as_secs_f64() * 1000.0,
            success_count,
            request_count,
            success_rate_percent,
        }
    }

    /// Build a summary from settled results
    pub fn from_results(results: &[RequestResult], total_duration: Duration) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count() as u32;
        Self::new(total_duration, success_count, results.len() as u32)
    }

    pub fn failure_count(&self) -> u32 {
        self.request_count - self.success_count
    }

    pub fn total_duration(&self) -> Duration {
        millis_to_duration(self.total_duration_ms)
    }

    pub fn all_succeeded(&self) -> bool {
        self.success_count == self.request_count
    }
}

fn millis_to_duration(millis: f64) -> Duration {
    Duration::from_nanos((millis.max(0.0) * 1_000_000.0).round() as u64)
}

/// Round half away from zero to one decimal place
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
