//! Metrics Module - per-step execution outcomes
//!
//! Key types:
//! - `RecordExecution` / `ExecutionMetric`: raw input and its validated record
//! - `MetricsCollector`: buffered, date-partitioned store with retention
//! - `MetricsQuery`: filters + pagination for reads
//! - `MetricsSummary`: status counts, rates and duration statistics
//! - `AnalyticsSink`: best-effort per-skill side channel

mod collector;
mod query;
mod record;
mod sink;
mod summary;

pub use collector::{MetricsCollector, MetricsOptions};
pub use query::{MetricsQuery, MetricsSource};
pub use record::{ExecutionMetric, MetricStatus, RecordExecution};
pub use sink::{AnalyticsSink, NoopSink, SkillOutcome, SkillUsageLog};
pub use summary::MetricsSummary;
