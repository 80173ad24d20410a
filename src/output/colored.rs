//! Colored formatter implementation with terminal color support
//!
//! Uses ANSI colors and Unicode symbols. Request durations are colored by
//! how much time the network added on top of the simulated delay.

use super::formatter::{
    banner_text, FormattingOptions, OutputFormatter, PlainFormatter, ResultRow, NO_TRANSPORT_STATS,
};
use crate::{
    error::{AppError, Result},
    heartbeat::{Direction, LogEntry},
    models::{TestConfig, TestSummary},
    stats::LatencyStats,
    types::{saturating_duration_from_secs, ChannelState, ChannelStatus, PerformanceLevel},
};
use colored::*;
use std::fmt::Write as _;
use std::time::Duration;

impl PerformanceLevel {
    /// Get color for this performance level
    pub fn color(&self) -> Color {
        match self {
            Self::Good => Color::Green,
            Self::Moderate => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }

    /// Get descriptive text
    pub fn description(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
    pub sent: Color,
    pub received: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            highlight: Color::Magenta,
            muted: Color::BrightBlack,
            sent: Color::Blue,
            received: Color::Green,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        let plain_formatter = PlainFormatter::new(options.clone());
        Self {
            plain_formatter,
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    /// Apply dimmed formatting if colors are enabled
    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    /// Duration colored by overhead over the requested delay
    fn format_duration_colored(&self, row: &ResultRow) -> ColoredString {
        let measured = saturating_duration_from_secs(row.duration_ms / 1000.0);
        let requested = saturating_duration_from_secs(row.requested_delay_secs);
        let level = PerformanceLevel::from_overhead(measured, requested);
        self.colorize(&format!("{:.2} ms", row.duration_ms), level.color())
    }

    /// Success rate colored by how close it is to 100%
    fn format_percentage_colored(&self, percentage: f64) -> ColoredString {
        let color = if percentage >= 95.0 {
            self.color_scheme.success
        } else if percentage >= 50.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        self.colorize(&format!("{:.1}%", percentage), color)
    }

    fn format_card(&self, row: &ResultRow) -> Result<String> {
        let mut output = String::new();
        let fields = row.fields();
        let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;

        write!(output, "{}", self.bold(&format!("Request #{}", row.index)))
            .map_err(|e| AppError::io(format!("Failed to format result: {}", e)))?;

        for (label, value) in &fields {
            let label = format!("{:<width$}", format!("{}:", label), width = width);
            let value = match label.trim_end() {
                "Status:" if row.is_success() => self.colorize("Success ✓", self.color_scheme.success),
                "Status:" | "Error:" => self.colorize(value, self.color_scheme.error),
                "Duration:" => self.format_duration_colored(row),
                "qlog:" if self.options.enable_color => value.as_str().color(self.color_scheme.info).underline(),
                _ => value.as_str().normal(),
            };
            write!(output, "\n  {} {}", self.dimmed(&label), value)
                .map_err(|e| AppError::io(format!("Failed to format result: {}", e)))?;
        }

        if row.is_success() && !row.has_transport_stats {
            write!(output, "\n  {}", self.dimmed(NO_TRANSPORT_STATS))
                .map_err(|e| AppError::io(format!("Failed to format result: {}", e)))?;
        }

        Ok(output)
    }

    fn format_line(&self, row: &ResultRow) -> String {
        let title = self.bold(&format!("#{:<4}", row.index));
        match row.error {
            Some(ref error) => format!("❌ {} {}", title, self.colorize(error, self.color_scheme.error)),
            None => {
                let mut line = format!("✅ {} {}", title, self.format_duration_colored(row));
                if row.has_transport_stats {
                    line.push_str(&format!(
                        " {} {}",
                        self.colorize(row.protocol.as_deref().unwrap_or("N/A"), self.color_scheme.highlight),
                        self.dimmed(&format!("rtt {}", row.rtt.as_deref().unwrap_or("N/A")))
                    ));
                } else if let Some(ref version) = row.http_version {
                    line.push_str(&format!(" {}", self.dimmed(version)));
                }
                line
            }
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_banner(&self, config: &TestConfig) -> Result<String> {
        Ok(format!("🚀 {}", self.colorize(&banner_text(config), self.color_scheme.header)))
    }

    fn format_result(&self, row: &ResultRow) -> Result<String> {
        if self.options.verbose_mode {
            self.format_card(row)
        } else {
            Ok(self.format_line(row))
        }
    }

    fn format_summary(&self, summary: &TestSummary) -> Result<String> {
        let color = if summary.all_succeeded() {
            self.color_scheme.success
        } else if summary.success_count == 0 {
            self.color_scheme.error
        } else {
            self.color_scheme.warning
        };

        Ok(format!(
            "📊 Test completed in {} | {} successful ({})",
            self.bold(&format!("{:.2}s", summary.total_duration_ms / 1000.0)),
            self.colorize(&format!("{}/{}", summary.success_count, summary.request_count), color),
            self.format_percentage_colored(summary.success_rate_percent)
        ))
    }

    fn format_latency_stats(&self, stats: &LatencyStats) -> Result<String> {
        let overhead_level = PerformanceLevel::from_overhead(
            saturating_duration_from_secs(stats.mean_overhead_ms / 1000.0),
            Duration::ZERO,
        );

        Ok(format!(
            "⏱️  {} min {:.2} ms | median {:.2} ms | mean {:.2} ms | max {:.2} ms | overhead {}",
            self.dimmed("Latency:"),
            stats.min_ms,
            stats.median_ms,
            stats.mean_ms,
            stats.max_ms,
            self.colorize(
                &format!("{:.2} ms ({})", stats.mean_overhead_ms, overhead_level.description()),
                overhead_level.color()
            )
        ))
    }

    fn format_preset(&self, query: &str) -> Result<String> {
        let preset = self.plain_formatter.format_preset(query)?;
        Ok(self.dimmed(&preset).to_string())
    }

    fn format_log_entry(&self, entry: &LogEntry) -> Result<String> {
        let (arrow, color) = match entry.direction {
            Direction::Sent => ("→", self.color_scheme.sent),
            Direction::Received => ("←", self.color_scheme.received),
            Direction::System => ("•", self.color_scheme.muted),
        };

        let text = if self.options.pretty_frames {
            entry.display_text()
        } else {
            entry.raw_text.clone()
        };

        Ok(format!(
            "{} {} {}",
            self.dimmed(&entry.timestamp.format("%H:%M:%S%.3f").to_string()),
            self.colorize(arrow, color),
            self.colorize(&text, color)
        ))
    }

    fn format_channel_state(&self, state: ChannelState, status: &ChannelStatus) -> Result<String> {
        let (icon, color) = match (state, status) {
            (_, ChannelStatus::Error(_)) => ("🔴", self.color_scheme.error),
            (ChannelState::Open, _) => ("🟢", self.color_scheme.success),
            (ChannelState::Connecting, _) => ("🟡", self.color_scheme.warning),
            (ChannelState::Closed, _) => ("⚪", self.color_scheme.muted),
        };

        let text = self.plain_formatter.format_channel_state(state, status)?;
        Ok(format!("{} {}", icon, self.colorize(&text, color)))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("❌ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("⚠️  {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✅ {}", self.colorize(message, self.color_scheme.success)))
    }
}
