//! Type definitions shared across the orchestrator, heartbeat channel and output

use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Lifecycle state of the heartbeat connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// No connection; initial and terminal state
    Closed,
    /// Connection requested, transport not yet open
    Connecting,
    /// Transport open, heartbeats flowing
    Open,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChannelState::Closed => "closed",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
        };
        f.write_str(label)
    }
}

/// User-visible status of the heartbeat channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    /// Never started, or stopped on request
    Idle,
    /// Connected and sending heartbeats
    Connected,
    /// Connection failed or was dropped by the peer
    Error(String),
}

impl ChannelStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, ChannelStatus::Error(_))
    }
}

/// Per-request outcome status used by renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Success,
    Failed,
}

/// Performance classification based on observed latency relative to the
/// delay the endpoint was asked to simulate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    /// Overhead below 100ms
    Good,
    /// Overhead between 100ms and 1s
    Moderate,
    /// Overhead above 1s
    Poor,
}

impl PerformanceLevel {
    /// Classify by how far the measured duration exceeds the requested delay
    pub fn from_overhead(measured: Duration, requested: Duration) -> Self {
        let overhead = measured.saturating_sub(requested).as_secs_f64();
        if overhead < 0.1 {
            Self::Good
        } else if overhead < 1.0 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }
}

/// Seconds to `Duration`, clamping negatives and NaN to zero and anything
/// past `Duration::MAX` to `Duration::MAX`
pub fn saturating_duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_duration_from_secs() {
        assert_eq!(saturating_duration_from_secs(1.5), Duration::from_millis(1500));
        assert_eq!(saturating_duration_from_secs(-2.0), Duration::ZERO);
        assert_eq!(saturating_duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(saturating_duration_from_secs(1e20), Duration::MAX);
        assert_eq!(saturating_duration_from_secs(f64::INFINITY), Duration::MAX);
    }

    #[test]
    fn test_performance_level_from_overhead() {
        let requested = Duration::from_secs(2);
        assert_eq!(PerformanceLevel::from_overhead(Duration::from_millis(2050), requested), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_overhead(Duration::from_millis(2500), requested), PerformanceLevel::Moderate);
        assert_eq!(PerformanceLevel::from_overhead(Duration::from_millis(4000), requested), PerformanceLevel::Poor);
        // Faster than requested saturates to zero overhead
        assert_eq!(PerformanceLevel::from_overhead(Duration::from_millis(10), requested), PerformanceLevel::Good);
    }

    #[test]
    fn test_channel_state_display() {
        assert_eq!(ChannelState::Closed.to_string(), "closed");
        assert_eq!(ChannelState::Open.to_string(), "open");
        assert!(ChannelStatus::Error("x".into()).is_error());
        assert!(!ChannelStatus::Idle.is_error());
    }
}
