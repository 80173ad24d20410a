//! Output formatting and display system
//!
//! Human-readable output goes through an [`OutputFormatter`]; `--json`
//! output goes through [`JsonEvent`], one object per line.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter};
pub use formatter::{
    banner_text, format_bytes, format_number, summary_text, FormattingOptions, OutputFormatter,
    PlainFormatter, ResultRow,
};

use crate::{
    error::Result,
    heartbeat::LogEntry,
    models::{TestConfig, TestSummary},
    stats::LatencyStats,
    types::ChannelState,
};
use serde::Serialize;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            pretty_frames: verbose,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// One line of `--json` output
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JsonEvent<'a> {
    RunStarted {
        run_id: &'a str,
        config: &'a TestConfig,
        preset: String,
    },
    #[serde(rename = "result")]
    Row(&'a ResultRow),
    Summary {
        summary: &'a TestSummary,
        latency: Option<&'a LatencyStats>,
    },
    ChannelState {
        state: ChannelState,
        status: String,
    },
    Heartbeat(&'a LogEntry),
}

impl JsonEvent<'_> {
    /// Serialize to a single line
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, RequestResult, ResponsePayload};
    use std::time::Duration;

    #[test]
    fn test_factory_honours_verbose() {
        let row = ResultRow::from(&RequestResult::new(
            1,
            Duration::from_millis(10),
            0.0,
            Outcome::Success(ResponsePayload::default()),
        ));

        let compact = OutputFormatterFactory::create_formatter(false, false);
        assert_eq!(compact.format_result(&row).unwrap().lines().count(), 1);

        let verbose = OutputFormatterFactory::create_formatter(false, true);
        assert!(verbose.format_result(&row).unwrap().lines().count() > 1);
    }

    #[test]
    fn test_json_result_line() {
        let row = ResultRow::from(&RequestResult::new(
            4,
            Duration::from_millis(10),
            0.5,
            Outcome::Failure { message: "HTTP 500: Internal Server Error".into() },
        ));
        let line = JsonEvent::Row(&row).to_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert!(!line.contains('\n'));
        assert_eq!(value["event"], "result");
        assert_eq!(value["index"], 4);
        assert_eq!(value["status"], "Failed");
        assert_eq!(value["error"], "HTTP 500: Internal Server Error");
    }

    #[test]
    fn test_json_summary_line() {
        let summary = TestSummary::new(Duration::from_millis(2000), 2, 3);
        let line = JsonEvent::Summary { summary: &summary, latency: None }.to_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["event"], "summary");
        assert_eq!(value["summary"]["success_count"], 2);
        assert_eq!(value["summary"]["success_rate_percent"], 66.7);
        assert!(value["latency"].is_null());
    }

    #[test]
    fn test_json_heartbeat_line() {
        let entry = LogEntry::sent(r#"{"type":"heartbeat","timestamp":5}"#);
        let value: serde_json::Value =
            serde_json::from_str(&JsonEvent::Heartbeat(&entry).to_line().unwrap()).unwrap();
        assert_eq!(value["event"], "heartbeat");
        assert_eq!(value["direction"], "sent");
    }
}
