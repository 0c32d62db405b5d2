//! MetricsCollector - buffered, date-partitioned execution metrics
//!
//! Write path: validated metrics land in the recent cache (read-your-writes)
//! and in a write buffer. Once the buffer reaches `flush_threshold` it is
//! flushed into `<dir>/YYYY-MM-DD.jsonl`, one file per `started_at` date.
//! Dates whose write fails stay queued for the next flush.
//!
//! While the disk keeps failing the buffer is bounded two ways. A failed
//! threshold flush is not retried until another `flush_threshold` metrics
//! have arrived, so each record does not rewrite the whole backlog. And the
//! re-queue is capped at `max_pending`, dropping the oldest metrics with a
//! logged count.
//!
//! Unlike the event log, metrics are not synced per record.
//!
//! The flush triggered by `record_execution` runs while the state lock is
//! already held (`flush_locked`), so it never re-acquires it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use super::query::{MetricsQuery, MetricsSource};
use super::record::{ExecutionMetric, RecordExecution};
use super::sink::{AnalyticsSink, NoopSink};
use super::summary::MetricsSummary;
use crate::error::{ObserveError, Result};
use crate::util::{DEFAULT_FLUSH_THRESHOLD, DEFAULT_MAX_PENDING, DEFAULT_RECENT_CACHE_SIZE};

const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Tuning knobs for a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsOptions {
    /// Buffered metrics that trigger a flush
    pub flush_threshold: usize,
    /// Size of the recent-metrics cache
    pub recent_cache_size: usize,
    /// Unwritten metrics kept across failed flushes
    pub max_pending: usize,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            recent_cache_size: DEFAULT_RECENT_CACHE_SIZE,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

#[derive(Default)]
struct MetricsState {
    /// Not yet written, in record order
    buffer: Vec<ExecutionMetric>,
    /// Most recent metrics, oldest first
    recent: VecDeque<ExecutionMetric>,
    /// After a failed flush: buffer length at which to try again
    retry_at: Option<usize>,
}

/// Outcome of one flush attempt
#[derive(Debug, Default)]
struct FlushReport {
    written: usize,
    requeued: usize,
    dropped: usize,
    errors: Vec<String>,
}

struct Inner {
    dir: PathBuf,
    options: MetricsOptions,
    sink: Arc<dyn AnalyticsSink>,
    state: Mutex<MetricsState>,
}

impl Inner {
    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.jsonl", date.format(PARTITION_DATE_FORMAT)))
    }

    /// Flush with the lock already held by the caller
    fn flush_locked(&self, state: &mut MetricsState) -> FlushReport {
        let mut report = FlushReport::default();
        if state.buffer.is_empty() {
            return report;
        }

        let pending = std::mem::take(&mut state.buffer);
        let mut groups: BTreeMap<NaiveDate, Vec<&ExecutionMetric>> = BTreeMap::new();
        for metric in &pending {
            groups
                .entry(metric.started_at.date_naive())
                .or_default()
                .push(metric);
        }

        let mut failed: BTreeSet<NaiveDate> = BTreeSet::new();
        for (date, metrics) in &groups {
            match self.write_partition(*date, metrics) {
                Ok(()) => report.written += metrics.len(),
                Err(e) => {
                    tracing::error!(
                        date = %date,
                        count = metrics.len(),
                        error = %e,
                        "Failed to flush metrics, re-queued"
                    );
                    report.errors.push(format!("{}: {}", date, e));
                    failed.insert(*date);
                }
            }
        }

        if failed.is_empty() {
            state.retry_at = None;
        } else {
            let mut requeued: Vec<ExecutionMetric> = pending
                .into_iter()
                .filter(|m| failed.contains(&m.started_at.date_naive()))
                .collect();
            if requeued.len() > self.options.max_pending {
                report.dropped = requeued.len() - self.options.max_pending;
                requeued.drain(..report.dropped);
                tracing::error!(
                    dropped = report.dropped,
                    max_pending = self.options.max_pending,
                    "Metrics backlog full, dropped oldest unwritten metrics"
                );
            }
            report.requeued = requeued.len();
            state.retry_at = Some(requeued.len() + self.options.flush_threshold);
            state.buffer = requeued;
        }

        tracing::debug!(
            written = report.written,
            requeued = report.requeued,
            "Flushed metrics"
        );
        report
    }

    fn write_partition(&self, date: NaiveDate, metrics: &[&ExecutionMetric]) -> std::io::Result<()> {
        let mut payload = String::new();
        for metric in metrics {
            payload.push_str(&serde_json::to_string(metric)?);
            payload.push('\n');
        }

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.partition_path(date))?;
        file.write_all(payload.as_bytes())?;
        file.flush()
    }

    /// Date partitions on disk, newest first
    fn partitions(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/????-??-??.jsonl",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| ObserveError::MetricsError {
            reason: e.to_string(),
        })?;

        let mut partitions = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ObserveError::MetricsError {
                reason: e.to_string(),
            })?;
            let date = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| NaiveDate::parse_from_str(s, PARTITION_DATE_FORMAT).ok());
            if let Some(date) = date {
                partitions.push((date, path));
            }
        }
        partitions.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(partitions)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let mut state = std::mem::take(self.state.get_mut());
        if state.buffer.is_empty() {
            return;
        }
        let report = self.flush_locked(&mut state);
        if report.requeued + report.dropped > 0 {
            tracing::warn!(
                lost = report.requeued + report.dropped,
                "Metrics dropped on shutdown"
            );
        }
    }
}

/// Thread-safe metrics store. Clones share state; pending metrics are flushed
/// when the last clone is dropped.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Inner>,
}

impl MetricsCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_options(dir, MetricsOptions::default(), Arc::new(NoopSink))
    }

    pub fn with_options(
        dir: impl Into<PathBuf>,
        options: MetricsOptions,
        sink: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let options = MetricsOptions {
            flush_threshold: options.flush_threshold.max(1),
            recent_cache_size: options.recent_cache_size.max(1),
            max_pending: options.max_pending.max(options.flush_threshold).max(1),
        };
        Self {
            inner: Arc::new(Inner {
                dir: dir.into(),
                options,
                sink,
                state: Mutex::new(MetricsState::default()),
            }),
        }
    }

    /// Same storage and options, different analytics sink
    pub fn with_sink(dir: impl Into<PathBuf>, sink: Arc<dyn AnalyticsSink>) -> Self {
        Self::with_options(dir, MetricsOptions::default(), sink)
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn options(&self) -> MetricsOptions {
        self.inner.options
    }

    // ═══════════════════════════════════════════════════════════════
    // WRITE PATH
    // ═══════════════════════════════════════════════════════════════

    /// Validate and record one step execution.
    ///
    /// Invalid input returns `ValidationError` and stores nothing. Flush
    /// and analytics failures are logged, never returned.
    pub fn record_execution(&self, input: RecordExecution) -> Result<ExecutionMetric> {
        let metric = ExecutionMetric::try_from(input)?;

        {
            let mut state = self.inner.state.lock();
            if state.recent.len() >= self.inner.options.recent_cache_size {
                state.recent.pop_front();
            }
            state.recent.push_back(metric.clone());
            state.buffer.push(metric.clone());

            let due = state.buffer.len() >= self.inner.options.flush_threshold
                && state.retry_at.map_or(true, |at| state.buffer.len() >= at);
            if due {
                self.inner.flush_locked(&mut state);
            }
        }

        if let Err(e) = self.inner.sink.record_outcome(
            metric.skill_or_unknown(),
            metric.status.is_success(),
            metric.duration_ms,
        ) {
            tracing::warn!(
                skill = metric.skill_or_unknown(),
                error = %e,
                "Analytics sink failed"
            );
        }

        Ok(metric)
    }

    /// Write every buffered metric now.
    ///
    /// Returns the number written. If any partition fails its metrics stay
    /// queued and `MetricsError` is returned.
    pub fn flush(&self) -> Result<usize> {
        let report = {
            let mut state = self.inner.state.lock();
            self.inner.flush_locked(&mut state)
        };
        if report.errors.is_empty() {
            Ok(report.written)
        } else {
            Err(ObserveError::MetricsError {
                reason: format!(
                    "{} metric(s) re-queued, {} dropped: {}",
                    report.requeued,
                    report.dropped,
                    report.errors.join("; ")
                ),
            })
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    pub fn cached_count(&self) -> usize {
        self.inner.state.lock().recent.len()
    }

    // ═══════════════════════════════════════════════════════════════
    // READ PATH
    // ═══════════════════════════════════════════════════════════════

    /// Matching metrics, newest first.
    ///
    /// Memory is served first (cache, then unflushed buffer), then date
    /// partitions newest file first and newest line first. Results are
    /// de-duplicated by execution id before `offset`/`limit` apply.
    pub fn get_metrics(&self, query: &MetricsQuery) -> Result<Vec<ExecutionMetric>> {
        let needed = query.needed();
        let is_full = |count: usize| needed.is_some_and(|n| count >= n);

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut matched = Vec::new();

        {
            let state = self.inner.state.lock();
            for metric in state.recent.iter().rev().chain(state.buffer.iter().rev()) {
                if is_full(matched.len()) {
                    break;
                }
                if query.matches(metric) && seen.insert(metric.execution_id.clone()) {
                    matched.push(metric.clone());
                }
            }
        }

        if !is_full(matched.len()) {
            'partitions: for (date, path) in self.inner.partitions()? {
                if !query.covers_date(date) {
                    continue;
                }
                let content = match fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Unreadable metrics partition");
                        continue;
                    }
                };
                for line in content.lines().rev() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let metric: ExecutionMetric = match serde_json::from_str(line) {
                        Ok(metric) => metric,
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "Skipping malformed metric");
                            continue;
                        }
                    };
                    if query.matches(&metric) && seen.insert(metric.execution_id.clone()) {
                        matched.push(metric);
                        if is_full(matched.len()) {
                            break 'partitions;
                        }
                    }
                }
            }
        }

        let page = matched.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }

    /// Aggregate over every metric matching `query` (pagination ignored)
    pub fn get_summary(&self, query: &MetricsQuery) -> Result<MetricsSummary> {
        let metrics = self.get_metrics(&query.unpaged())?;
        Ok(MetricsSummary::from_metrics(&metrics))
    }

    /// Per-skill aggregates; metrics without a skill go to `"unknown"`
    pub fn get_summary_by_skill(
        &self,
        query: &MetricsQuery,
    ) -> Result<BTreeMap<String, MetricsSummary>> {
        let metrics = self.get_metrics(&query.unpaged())?;
        Ok(MetricsSummary::by_skill(&metrics))
    }

    // ═══════════════════════════════════════════════════════════════
    // RETENTION
    // ═══════════════════════════════════════════════════════════════

    /// Delete date partitions strictly older than `today - retention_days`.
    ///
    /// Only `YYYY-MM-DD.jsonl` files are considered. The buffer and cache are
    /// left alone. Returns the number of files deleted.
    pub fn cleanup_old_metrics(&self, retention_days: u32) -> Result<usize> {
        // No representable cutoff: nothing is old enough
        let Some(cutoff) = Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(u64::from(retention_days)))
        else {
            return Ok(0);
        };
        let cutoff = cutoff.format(PARTITION_DATE_FORMAT).to_string();

        let mut deleted = 0;
        for (date, path) in self.inner.partitions()? {
            if date.format(PARTITION_DATE_FORMAT).to_string() < cutoff {
                fs::remove_file(&path)?;
                tracing::info!(path = %path.display(), "Deleted expired metrics partition");
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl MetricsSource for MetricsCollector {
    fn get_metrics(&self, query: &MetricsQuery) -> Result<Vec<ExecutionMetric>> {
        MetricsCollector::get_metrics(self, query)
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MetricsCollector")
            .field("dir", &self.inner.dir)
            .field("options", &self.inner.options)
            .field("pending", &state.buffer.len())
            .field("cached", &state.recent.len())
            .finish()
    }
}
