//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation used for scripts, logs and `--no-color`.

use crate::{
    error::{AppError, Result},
    heartbeat::LogEntry,
    models::{RequestResult, TestConfig, TestSummary},
    stats::LatencyStats,
    types::{ChannelState, ChannelStatus, RequestStatus},
};
use serde::Serialize;
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format the line announcing a burst before the first dispatch
    fn format_banner(&self, config: &TestConfig) -> Result<String>;

    /// Format one settled request
    fn format_result(&self, row: &ResultRow) -> Result<String>;

    /// Format the completion line of a run
    fn format_summary(&self, summary: &TestSummary) -> Result<String>;

    /// Format latency statistics over the successful requests
    fn format_latency_stats(&self, stats: &LatencyStats) -> Result<String>;

    /// Format the preset that reproduces a run
    fn format_preset(&self, query: &str) -> Result<String>;

    /// Format one heartbeat log entry
    fn format_log_entry(&self, entry: &LogEntry) -> Result<String>;

    /// Format a heartbeat channel state transition
    fn format_channel_state(&self, state: ChannelState, status: &ChannelStatus) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Render every result as a multi-line card instead of one line
    pub verbose_mode: bool,
    /// Pretty-print JSON heartbeat frames
    pub pretty_frames: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            pretty_frames: false,
        }
    }
}

/// One settled request flattened for display. Transport fields are `None`
/// when the server did not report them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub index: u32,
    pub status: RequestStatus,
    pub duration_ms: f64,
    pub requested_delay_secs: f64,
    pub method: Option<String>,
    pub origin: Option<String>,
    pub http_version: Option<String>,
    pub has_transport_stats: bool,
    pub protocol: Option<String>,
    pub rtt: Option<String>,
    pub dropped_packets: Option<u64>,
    pub congestion_window_bytes: Option<u64>,
    pub qlog_url: Option<String>,
    pub error: Option<String>,
}

impl From<&RequestResult> for ResultRow {
    fn from(result: &RequestResult) -> Self {
        let payload = result.payload();
        let transport = payload.and_then(|p| p.transport.as_ref());

        Self {
            index: result.index,
            status: result.outcome.status(),
            duration_ms: result.duration_ms,
            requested_delay_secs: result.requested_delay_secs,
            method: payload.and_then(|p| p.method.clone()),
            origin: payload.and_then(|p| p.origin.clone()),
            http_version: payload.and_then(|p| p.http_version.clone()),
            has_transport_stats: transport.is_some(),
            protocol: transport.and_then(|t| t.protocol.clone()),
            rtt: transport.and_then(|t| t.rtt.clone()),
            dropped_packets: transport.and_then(|t| t.dropped_packets),
            congestion_window_bytes: transport.and_then(|t| t.congestion_window_bytes),
            qlog_url: transport.and_then(|t| t.qlog_url.clone()),
            error: result.error_message().map(str::to_string),
        }
    }
}

impl ResultRow {
    pub fn is_success(&self) -> bool {
        self.status == RequestStatus::Success
    }

    /// Label/value pairs shown on a result card, in display order
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        if let Some(ref error) = self.error {
            return vec![("Status", "Error".to_string()), ("Error", error.clone())];
        }

        let mut fields = vec![
            ("Status", "Success".to_string()),
            ("Duration", format!("{:.2} ms", self.duration_ms)),
            ("Method", self.method.clone().unwrap_or_else(|| NOT_AVAILABLE.into())),
            ("Origin", self.origin.clone().unwrap_or_else(|| NOT_AVAILABLE.into())),
        ];

        if let Some(ref version) = self.http_version {
            fields.push(("HTTP Version", version.clone()));
        }

        if self.has_transport_stats {
            fields.push(("Protocol", self.protocol.clone().unwrap_or_else(|| NOT_AVAILABLE.into())));
            fields.push(("RTT", self.rtt.clone().unwrap_or_else(|| NOT_AVAILABLE.into())));
            fields.push(("Dropped Packets", format_number(self.dropped_packets.unwrap_or(0))));
            if let Some(window) = self.congestion_window_bytes {
                fields.push(("Congestion Window", format_bytes(window)));
            }
            if let Some(ref qlog) = self.qlog_url {
                fields.push(("qlog", qlog.clone()));
            }
        }

        fields
    }
}

pub(crate) const NOT_AVAILABLE: &str = "N/A";
pub(crate) const NO_TRANSPORT_STATS: &str = "No HTTP/3 statistics available (using HTTP/1.1 or HTTP/2)";

/// Human-readable byte size, 1024-based, at most two decimals
pub fn format_bytes(bytes: u64) -> String {
    const SIZES: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZES.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    // Display of f64 drops trailing zeros: 1.50 -> "1.5", 2.00 -> "2"
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZES[unit])
}

/// Integer with comma thousands separators
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }

    output
}

/// Text of the start banner, shared by every formatter
pub fn banner_text(config: &TestConfig) -> String {
    let endpoint = if config.endpoint_delay_increment_secs > 0.0 {
        format!(
            "{}s (+{}s/req)",
            config.initial_endpoint_delay_secs, config.endpoint_delay_increment_secs
        )
    } else {
        format!("{}s", config.initial_endpoint_delay_secs)
    };

    let launch = if config.is_parallel() {
        " in parallel".to_string()
    } else {
        let increment = if config.launch_delay_increment_ms > 0 {
            format!(" (+{}ms/req)", config.launch_delay_increment_ms)
        } else {
            String::new()
        };
        format!(
            " with {}ms initial delay{} between requests",
            config.initial_launch_delay_ms, increment
        )
    };

    format!(
        "Starting {} requests to /delay/{}{}...",
        config.request_count, endpoint, launch
    )
}

/// Text of the completion line, shared by every formatter
pub fn summary_text(summary: &TestSummary) -> String {
    format!(
        "Test completed in {:.2}s | {}/{} successful ({:.1}%)",
        summary.total_duration_ms / 1000.0,
        summary.success_count,
        summary.request_count,
        summary.success_rate_percent
    )
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    fn format_card(&self, row: &ResultRow) -> Result<String> {
        let mut output = String::new();
        let fields = row.fields();
        let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;

        write!(output, "Request #{}", row.index)
            .map_err(|e| AppError::io(format!("Failed to format result: {}", e)))?;
        for (label, value) in &fields {
            write!(output, "\n  {:<width$} {}", format!("{}:", label), value, width = width)
                .map_err(|e| AppError::io(format!("Failed to format result: {}", e)))?;
        }

        if row.is_success() && !row.has_transport_stats {
            write!(output, "\n  {}", NO_TRANSPORT_STATS)
                .map_err(|e| AppError::io(format!("Failed to format result: {}", e)))?;
        }

        Ok(output)
    }

    fn format_line(&self, row: &ResultRow) -> String {
        match row.error {
            Some(ref error) => format!("Request #{}: Error - {}", row.index, error),
            None => {
                let mut line = format!("Request #{}: Success in {:.2} ms", row.index, row.duration_ms);
                if row.has_transport_stats {
                    line.push_str(&format!(
                        " ({}, RTT {})",
                        row.protocol.as_deref().unwrap_or(NOT_AVAILABLE),
                        row.rtt.as_deref().unwrap_or(NOT_AVAILABLE)
                    ));
                }
                line
            }
        }
    }

    fn entry_text(&self, entry: &LogEntry) -> String {
        if self.options.pretty_frames {
            entry.display_text()
        } else {
            entry.raw_text.clone()
        }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_banner(&self, config: &TestConfig) -> Result<String> {
        Ok(banner_text(config))
    }

    fn format_result(&self, row: &ResultRow) -> Result<String> {
        if self.options.verbose_mode {
            self.format_card(row)
        } else {
            Ok(self.format_line(row))
        }
    }

    fn format_summary(&self, summary: &TestSummary) -> Result<String> {
        Ok(summary_text(summary))
    }

    fn format_latency_stats(&self, stats: &LatencyStats) -> Result<String> {
        Ok(format!(
            "Latency: min {:.2} ms | median {:.2} ms | mean {:.2} ms | max {:.2} ms",
            stats.min_ms, stats.median_ms, stats.mean_ms, stats.max_ms
        ))
    }

    fn format_preset(&self, query: &str) -> Result<String> {
        if query.is_empty() {
            Ok("Preset: (defaults)".to_string())
        } else {
            Ok(format!("Preset: --preset '{}'", query))
        }
    }

    fn format_log_entry(&self, entry: &LogEntry) -> Result<String> {
        Ok(format!(
            "[{}] {:<8} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.direction.to_string().to_uppercase(),
            self.entry_text(entry)
        ))
    }

    fn format_channel_state(&self, state: ChannelState, status: &ChannelStatus) -> Result<String> {
        match status {
            ChannelStatus::Error(reason) => Ok(format!("Heartbeat channel {} ({})", state, reason)),
            _ => Ok(format!("Heartbeat channel {}", state)),
        }
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, ResponsePayload, TransportInfo};
    use std::time::Duration;

    fn success_row(transport: Option<TransportInfo>) -> ResultRow {
        let payload = ResponsePayload {
            origin: Some("203.0.113.7".into()),
            method: Some("GET".into()),
            http_version: Some("HTTP/1.1".into()),
            transport,
        };
        let result = RequestResult::new(2, Duration::from_micros(1_234_567), 1.0, Outcome::Success(payload));
        ResultRow::from(&result)
    }

    fn http3() -> TransportInfo {
        TransportInfo {
            protocol: Some("HTTP/3".into()),
            rtt: Some("31.2ms".into()),
            dropped_packets: Some(1234),
            congestion_window_bytes: Some(14_720),
            qlog_url: Some("https://qvis.example/?file=abc".into()),
        }
    }

    fn plain(verbose: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: verbose,
            pretty_frames: false,
        })
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(14_720), "14.38 KB");
        assert_eq!(format_bytes(1_048_576), "1 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
        // Past GB the unit saturates
        assert_eq!(format_bytes(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_banner_text() {
        let config = TestConfig {
            request_count: 5,
            initial_launch_delay_ms: 20,
            launch_delay_increment_ms: 10,
            initial_endpoint_delay_secs: 10.0,
            endpoint_delay_increment_secs: 0.5,
        };
        assert_eq!(
            banner_text(&config),
            "Starting 5 requests to /delay/10s (+0.5s/req) with 20ms initial delay (+10ms/req) between requests..."
        );

        let parallel = TestConfig {
            initial_launch_delay_ms: 0,
            launch_delay_increment_ms: 0,
            endpoint_delay_increment_secs: 0.0,
            initial_endpoint_delay_secs: 2.5,
            ..config
        };
        assert_eq!(banner_text(&parallel), "Starting 5 requests to /delay/2.5s in parallel...");
    }

    #[test]
    fn test_summary_text() {
        let summary = TestSummary::new(Duration::from_millis(1234), 4, 5);
        assert_eq!(summary_text(&summary), "Test completed in 1.23s | 4/5 successful (80.0%)");

        let none = TestSummary::new(Duration::from_millis(50), 0, 3);
        assert_eq!(summary_text(&none), "Test completed in 0.05s | 0/3 successful (0.0%)");
    }

    #[test]
    fn test_result_row_flattening() {
        let row = success_row(Some(http3()));
        assert_eq!(row.index, 2);
        assert!(row.is_success());
        assert!(row.has_transport_stats);
        assert_eq!(row.rtt.as_deref(), Some("31.2ms"));
        assert_eq!(row.congestion_window_bytes, Some(14_720));
        assert!(row.error.is_none());

        let failed = RequestResult::new(
            3,
            Duration::from_millis(5),
            1.0,
            Outcome::Failure { message: "HTTP 503: Service Unavailable".into() },
        );
        let row = ResultRow::from(&failed);
        assert!(!row.is_success());
        assert!(row.origin.is_none());
        assert_eq!(row.fields(), vec![
            ("Status", "Error".to_string()),
            ("Error", "HTTP 503: Service Unavailable".to_string()),
        ]);
    }

    #[test]
    fn test_card_with_transport_stats() {
        let card = plain(true).format_result(&success_row(Some(http3()))).unwrap();
        assert!(card.starts_with("Request #2\n"));
        assert!(card.contains("Duration:"));
        assert!(card.contains("1234.57 ms"));
        assert!(card.contains("Dropped Packets:   1,234"));
        assert!(card.contains("Congestion Window: 14.38 KB"));
        assert!(card.contains("qlog:"));
        assert!(!card.contains(NO_TRANSPORT_STATS));
    }

    #[test]
    fn test_card_without_transport_stats() {
        let card = plain(true).format_result(&success_row(None)).unwrap();
        assert!(card.contains("Origin:"));
        assert!(card.contains("203.0.113.7"));
        assert!(card.ends_with(NO_TRANSPORT_STATS));
        assert!(!card.contains("RTT"));
    }

    #[test]
    fn test_compact_lines() {
        let formatter = plain(false);
        assert_eq!(
            formatter.format_result(&success_row(Some(http3()))).unwrap(),
            "Request #2: Success in 1234.57 ms (HTTP/3, RTT 31.2ms)"
        );
        assert_eq!(
            formatter.format_result(&success_row(None)).unwrap(),
            "Request #2: Success in 1234.57 ms"
        );
    }

    #[test]
    fn test_log_entry_line() {
        let entry = LogEntry::sent(r#"{"type":"heartbeat","timestamp":1}"#);
        let line = plain(false).format_log_entry(&entry).unwrap();
        assert!(line.contains("SENT"));
        assert!(line.ends_with(r#"{"type":"heartbeat","timestamp":1}"#));

        let pretty = PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: false,
            pretty_frames: true,
        });
        assert!(pretty.format_log_entry(&entry).unwrap().contains("\"type\": \"heartbeat\""));
    }

    #[test]
    fn test_channel_state_line() {
        let formatter = plain(false);
        assert_eq!(
            formatter.format_channel_state(ChannelState::Open, &ChannelStatus::Connected).unwrap(),
            "Heartbeat channel open"
        );
        assert_eq!(
            formatter
                .format_channel_state(ChannelState::Closed, &ChannelStatus::Error("refused".into()))
                .unwrap(),
            "Heartbeat channel closed (refused)"
        );
    }

    #[test]
    fn test_preset_line() {
        let formatter = plain(false);
        assert_eq!(formatter.format_preset("").unwrap(), "Preset: (defaults)");
        assert_eq!(formatter.format_preset("count=9").unwrap(), "Preset: --preset 'count=9'");
    }
}
