//! Burst parameters: raw user input, the resolved `TestConfig`, and the
//! per-request `RequestTask` plan derived from it

use crate::defaults::{
    DEFAULT_ENDPOINT_DELAY_INCREMENT_SECS, DEFAULT_ENDPOINT_DELAY_SECS,
    DEFAULT_LAUNCH_DELAY_INCREMENT_MS, DEFAULT_LAUNCH_DELAY_MS, DEFAULT_REQUEST_COUNT,
    MAX_REQUESTS,
};
use crate::error::{AppError, Result};
use crate::types::saturating_duration_from_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unparsed burst parameters as they arrive from the CLI, the environment
/// or a query-string preset. Each field is `None` when the source left it unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTestParams {
    pub request_count: Option<String>,
    pub launch_delay_ms: Option<String>,
    pub launch_delay_increment_ms: Option<String>,
    pub endpoint_delay_secs: Option<String>,
    pub endpoint_delay_increment_secs: Option<String>,
}

impl RawTestParams {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(&mut self, other: RawTestParams) {
        if other.request_count.is_some() {
            self.request_count = other.request_count;
        }
        if other.launch_delay_ms.is_some() {
            self.launch_delay_ms = other.launch_delay_ms;
        }
        if other.launch_delay_increment_ms.is_some() {
            self.launch_delay_increment_ms = other.launch_delay_increment_ms;
        }
        if other.endpoint_delay_secs.is_some() {
            self.endpoint_delay_secs = other.endpoint_delay_secs;
        }
        if other.endpoint_delay_increment_secs.is_some() {
            self.endpoint_delay_increment_secs = other.endpoint_delay_increment_secs;
        }
    }
}

/// Resolved, immutable burst configuration. Every value is finite; the
/// request count is range-checked by `validate`, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    pub request_count: i64,
    pub initial_launch_delay_ms: i64,
    pub launch_delay_increment_ms: i64,
    pub initial_endpoint_delay_secs: f64,
    pub endpoint_delay_increment_secs: f64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            request_count: DEFAULT_REQUEST_COUNT as i64,
            initial_launch_delay_ms: DEFAULT_LAUNCH_DELAY_MS,
            launch_delay_increment_ms: DEFAULT_LAUNCH_DELAY_INCREMENT_MS,
            initial_endpoint_delay_secs: DEFAULT_ENDPOINT_DELAY_SECS,
            endpoint_delay_increment_secs: DEFAULT_ENDPOINT_DELAY_INCREMENT_SECS,
        }
    }
}

impl TestConfig {
    /// Resolve raw input, falling back to the default for any field that is
    /// missing, non-numeric or non-finite
    pub fn from_raw(raw: &RawTestParams) -> Self {
        let defaults = Self::default();
        Self {
            request_count: resolve_int(raw.request_count.as_deref(), defaults.request_count),
            initial_launch_delay_ms: resolve_int(raw.launch_delay_ms.as_deref(), defaults.initial_launch_delay_ms),
            launch_delay_increment_ms: resolve_int(
                raw.launch_delay_increment_ms.as_deref(),
                defaults.launch_delay_increment_ms,
            ),
            initial_endpoint_delay_secs: resolve_float(
                raw.endpoint_delay_secs.as_deref(),
                defaults.initial_endpoint_delay_secs,
            ),
            endpoint_delay_increment_secs: resolve_float(
                raw.endpoint_delay_increment_secs.as_deref(),
                defaults.endpoint_delay_increment_secs,
            ),
        }
    }

    /// Reject request counts outside `1..=MAX_REQUESTS`
    pub fn validate(&self) -> Result<()> {
        if self.request_count < 1 || self.request_count > MAX_REQUESTS as i64 {
            return Err(AppError::validation(format!(
                "Please enter a number between 1 and {} (got {})",
                MAX_REQUESTS, self.request_count
            )));
        }
        Ok(())
    }

    /// Number of requests this config schedules, zero when invalid
    pub fn scheduled_count(&self) -> u32 {
        if self.validate().is_ok() {
            self.request_count as u32
        } else {
            0
        }
    }

    /// Compute the task for 1-based `index`
    pub fn task(&self, index: u32) -> RequestTask {
        let step = i64::from(index.saturating_sub(1));

        let endpoint = self.initial_endpoint_delay_secs + self.endpoint_delay_increment_secs * step as f64;
        // Negative progressions clamp to "immediate", overflow to the largest finite delay
        let target_endpoint_delay_secs = if endpoint.is_nan() || endpoint <= 0.0 {
            0.0
        } else if !endpoint.is_finite() {
            f64::MAX
        } else {
            let rounded = (endpoint * 1000.0).round() / 1000.0;
            if rounded.is_finite() { rounded } else { endpoint }
        };

        let launch_ms = self
            .initial_launch_delay_ms
            .saturating_add(self.launch_delay_increment_ms.saturating_mul(step));
        let launch_delay_after_previous = Duration::from_millis(launch_ms.max(0) as u64);

        RequestTask {
            index,
            target_endpoint_delay_secs,
            launch_delay_after_previous,
        }
    }

    /// The full schedule in submission order
    pub fn tasks(&self) -> impl Iterator<Item = RequestTask> + '_ {
        (1..=self.scheduled_count()).map(move |i| self.task(i))
    }

    /// Total pause the scheduling loop induces before the last dispatch.
    /// The last task's pause is never taken.
    pub fn planned_launch_span(&self) -> Duration {
        let count = self.scheduled_count();
        self.tasks()
            .filter(|task| task.index < count)
            .map(|task| task.launch_delay_after_previous)
            .sum()
    }

    /// Whether any launch stagger is configured at all
    pub fn is_parallel(&self) -> bool {
        self.initial_launch_delay_ms <= 0 && self.launch_delay_increment_ms <= 0
    }

    /// Shortest query-string preset that reproduces this config
    pub fn to_query_string(&self) -> String {
        crate::config::query::to_query_string(self)
    }
}

/// One scheduled request. Created at scheduling time and dropped once the
/// request settles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestTask {
    /// 1-based submission index
    pub index: u32,
    /// Delay the endpoint is asked to simulate, in seconds
    pub target_endpoint_delay_secs: f64,
    /// Pause taken after dispatching this task, before the next one
    pub launch_delay_after_previous: Duration,
}

impl RequestTask {
    pub fn target_endpoint_delay(&self) -> Duration {
        saturating_duration_from_secs(self.target_endpoint_delay_secs)
    }
}

/// Parse a leading integer the way lenient form input does ("25ms" -> 25)
pub(crate) fn parse_int_prefix(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|value| value * sign)
}

/// Parse a leading decimal number ("2.5s" -> 2.5); rejects NaN and infinities
pub(crate) fn parse_float_prefix(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-') | Some(b'+')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    trimmed[..end]
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn resolve_int(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(parse_int_prefix).unwrap_or(default)
}

fn resolve_float(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(parse_float_prefix).unwrap_or(default)
}
