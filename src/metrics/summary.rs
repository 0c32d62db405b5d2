//! Aggregate metric summaries
//!
//! Gate-pass rate is computed only over metrics that recorded a gate outcome;
//! metrics without one are left out of that denominator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::record::{ExecutionMetric, MetricStatus};

/// Summary of a set of execution metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total: u64,
    /// status -> count (every status present, zero if unseen)
    pub by_status: BTreeMap<String, u64>,
    /// Percentage (0.0 to 100.0), 0.0 when empty
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub median_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub p95_duration_ms: u64,
    pub total_retries: u64,
    /// Metrics that recorded a gate outcome
    pub gate_evaluated: u64,
    pub gate_passed: u64,
    /// Percentage over `gate_evaluated`, absent when no gate ran
    pub gate_pass_rate: Option<f64>,
}

impl MetricsSummary {
    pub fn from_metrics<'a, I>(metrics: I) -> Self
    where
        I: IntoIterator<Item = &'a ExecutionMetric>,
    {
        let mut by_status: BTreeMap<String, u64> = MetricStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut durations = Vec::new();
        let mut successes = 0u64;
        let mut total_retries = 0u64;
        let mut gate_evaluated = 0u64;
        let mut gate_passed = 0u64;

        for metric in metrics {
            *by_status.entry(metric.status.to_string()).or_insert(0) += 1;
            if metric.status.is_success() {
                successes += 1;
            }
            durations.push(metric.duration_ms);
            total_retries += u64::from(metric.retry_count);
            if let Some(passed) = metric.gate_pass {
                gate_evaluated += 1;
                if passed {
                    gate_passed += 1;
                }
            }
        }

        let total = durations.len() as u64;
        if total == 0 {
            return Self {
                by_status,
                ..Self::default()
            };
        }

        durations.sort_unstable();
        let count = durations.len();
        let sum: u64 = durations.iter().sum();
        let median = if count % 2 == 0 {
            (durations[count / 2 - 1] + durations[count / 2]) as f64 / 2.0
        } else {
            durations[count / 2] as f64
        };

        Self {
            total,
            by_status,
            success_rate: successes as f64 / total as f64 * 100.0,
            avg_duration_ms: sum as f64 / count as f64,
            median_duration_ms: median,
            min_duration_ms: durations[0],
            max_duration_ms: durations[count - 1],
            p95_duration_ms: durations[(count * 95 / 100).min(count - 1)],
            total_retries,
            gate_evaluated,
            gate_passed,
            gate_pass_rate: (gate_evaluated > 0)
                .then(|| gate_passed as f64 / gate_evaluated as f64 * 100.0),
        }
    }

    /// Group by skill; metrics without one land in `"unknown"`
    pub fn by_skill<'a, I>(metrics: I) -> BTreeMap<String, MetricsSummary>
    where
        I: IntoIterator<Item = &'a ExecutionMetric>,
    {
        let mut groups: BTreeMap<String, Vec<&ExecutionMetric>> = BTreeMap::new();
        for metric in metrics {
            groups
                .entry(metric.skill_or_unknown().to_string())
                .or_default()
                .push(metric);
        }
        groups
            .into_iter()
            .map(|(skill, group)| (skill, Self::from_metrics(group)))
            .collect()
    }

    pub fn failures(&self) -> u64 {
        self.total - self.by_status.get("success").copied().unwrap_or(0)
    }
}
