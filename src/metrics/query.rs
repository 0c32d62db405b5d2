//! Metrics query filters + the read seam used by the dashboard

use chrono::{DateTime, NaiveDate, Utc};

use super::record::{ExecutionMetric, MetricStatus};
use crate::error::Result;

/// Filter + pagination for `get_metrics`.
///
/// `started_after` is inclusive, `started_before` exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsQuery {
    pub workflow_id: Option<String>,
    pub step_id: Option<String>,
    pub status: Option<MetricStatus>,
    pub skill: Option<String>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl MetricsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn status(mut self, status: MetricStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    pub fn started_after(mut self, at: DateTime<Utc>) -> Self {
        self.started_after = Some(at);
        self
    }

    pub fn started_before(mut self, at: DateTime<Utc>) -> Self {
        self.started_before = Some(at);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, metric: &ExecutionMetric) -> bool {
        self.workflow_id
            .as_ref()
            .is_none_or(|id| *id == metric.workflow_id)
            && self.step_id.as_ref().is_none_or(|id| *id == metric.step_id)
            && self.status.is_none_or(|s| s == metric.status)
            && self
                .skill
                .as_ref()
                .is_none_or(|skill| skill == metric.skill_or_unknown())
            && self.started_after.is_none_or(|at| metric.started_at >= at)
            && self.started_before.is_none_or(|at| metric.started_at < at)
    }

    /// Whether a date partition can hold matching metrics
    pub(crate) fn covers_date(&self, date: NaiveDate) -> bool {
        self.started_after
            .is_none_or(|at| date >= at.date_naive())
            && self
                .started_before
                .is_none_or(|at| date <= at.date_naive())
    }

    /// Matches to collect before pagination can stop early
    pub(crate) fn needed(&self) -> Option<usize> {
        self.limit.map(|limit| self.offset.saturating_add(limit))
    }

    /// Same filters, no pagination
    pub fn unpaged(&self) -> Self {
        Self {
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }
}

/// Read access to recorded metrics.
///
/// Implemented by `MetricsCollector`; the dashboard depends on this trait so
/// a failing source can be swapped in.
pub trait MetricsSource: Send + Sync {
    fn get_metrics(&self, query: &MetricsQuery) -> Result<Vec<ExecutionMetric>>;
}
