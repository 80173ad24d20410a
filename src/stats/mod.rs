//! Latency statistics over the successful requests of a run

use crate::models::RequestResult;
use serde::{Deserialize, Serialize};

/// Distribution of client-side durations, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub sample_count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub std_dev_ms: f64,
    /// Mean of `duration - requested delay`, i.e. what the network and
    /// server added on top of the simulated wait
    pub mean_overhead_ms: f64,
}

impl LatencyStats {
    /// Statistics over the successful results; `None` when nothing succeeded
    pub fn from_results(results: &[RequestResult]) -> Option<Self> {
        let successes: Vec<&RequestResult> = results.iter().filter(|r| r.is_success()).collect();
        if successes.is_empty() {
            return None;
        }

        let mut durations: Vec<f64> = successes.iter().map(|r| r.duration_ms).collect();
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = durations.len() as f64;
        let mean = durations.iter().sum::<f64>() / count;
        let variance = durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / count;
        let mean_overhead = successes
            .iter()
            .map(|r| (r.duration_ms - r.requested_delay_secs * 1000.0).max(0.0))
            .sum::<f64>()
            / count;

        Some(Self {
            sample_count: durations.len(),
            min_ms: durations[0],
            max_ms: durations[durations.len() - 1],
            mean_ms: mean,
            median_ms: percentile(&durations, 50.0),
            p95_ms: percentile(&durations, 95.0),
            std_dev_ms: variance.sqrt(),
            mean_overhead_ms: mean_overhead,
        })
    }
}

/// Linear interpolation between closest ranks of an ascending slice
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let weight = index - lower_index as f64;
        sorted_values[lower_index] + weight * (sorted_values[upper_index] - sorted_values[lower_index])
    }
}
