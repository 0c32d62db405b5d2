//! Dashboard - correlated workflow reports
//!
//! Each data source (trace, graph, event counts, metrics) is fetched on its
//! own. A failing source fills `<field>_error` and the rest of the report is
//! still returned. Only a malformed workflow id aborts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ObserveError, Result};
use crate::event::{EventLog, ExecutionTrace, StepStatus};
use crate::graph::{ExecutionGraph, GraphGenerator};
use crate::metrics::{ExecutionMetric, MetricsQuery, MetricsSource, MetricsSummary};
use crate::util::validate_workflow_id;

/// Metrics recorded for one workflow
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowMetrics {
    pub summary: MetricsSummary,
    /// Newest first
    pub records: Vec<ExecutionMetric>,
}

/// Trace step joined with its metric records
#[derive(Debug, Clone, Serialize)]
pub struct StepCorrelation {
    pub step_id: String,
    pub status: StepStatus,
    pub duration_ms: Option<u64>,
    pub metrics: Vec<ExecutionMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bottleneck {
    pub step_id: String,
    pub operation: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Correlation {
    pub steps: Vec<StepCorrelation>,
    /// Slowest step by trace duration, first one on ties
    pub bottleneck: Option<Bottleneck>,
}

impl Correlation {
    pub fn build(trace: &ExecutionTrace, metrics: &[ExecutionMetric]) -> Self {
        let steps = trace
            .steps
            .iter()
            .map(|step| StepCorrelation {
                step_id: step.step_id.clone(),
                status: step.status,
                duration_ms: step.duration_ms,
                metrics: metrics
                    .iter()
                    .filter(|m| m.step_id == step.step_id)
                    .cloned()
                    .collect(),
            })
            .collect();

        let mut bottleneck: Option<Bottleneck> = None;
        for step in &trace.steps {
            let Some(duration_ms) = step.duration_ms else {
                continue;
            };
            if bottleneck.as_ref().is_none_or(|b| duration_ms > b.duration_ms) {
                bottleneck = Some(Bottleneck {
                    step_id: step.step_id.clone(),
                    operation: step.operation_name(),
                    duration_ms,
                });
            }
        }

        Self { steps, bottleneck }
    }
}

/// Single-workflow report
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub workflow_id: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<ExecutionTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<ExecutionGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_counts: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_counts_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<WorkflowMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
    /// Present when both trace and metrics were available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Correlation>,
}

impl WorkflowReport {
    /// `(field, message)` for every failed source
    pub fn errors(&self) -> Vec<(&'static str, &str)> {
        [
            ("trace", &self.trace_error),
            ("graph", &self.graph_error),
            ("event_counts", &self.event_counts_error),
            ("metrics", &self.metrics_error),
        ]
        .into_iter()
        .filter_map(|(field, err)| err.as_deref().map(|e| (field, e)))
        .collect()
    }

    pub fn is_partial(&self) -> bool {
        !self.errors().is_empty()
    }
}

/// One workflow in a fleet report
#[derive(Debug, Clone, Serialize)]
pub struct FleetEntry {
    pub workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Box<WorkflowReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetTotals {
    pub workflow_count: usize,
    /// Workflows with an end timestamp
    pub completed: usize,
    /// Workflows with at least one failed step
    pub failed: usize,
    pub total_steps: usize,
}

/// Report over every persisted workflow
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub generated_at: DateTime<Utc>,
    pub workflows: Vec<FleetEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_error: Option<String>,
    pub totals: FleetTotals,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DashboardReport {
    Workflow(Box<WorkflowReport>),
    Fleet(FleetReport),
}

/// Composes the event log, graph generator and a metrics source
#[derive(Clone)]
pub struct Dashboard {
    pub(crate) log: EventLog,
    graphs: GraphGenerator,
    metrics: Arc<dyn MetricsSource>,
}

impl Dashboard {
    pub fn new(log: EventLog, metrics: Arc<dyn MetricsSource>) -> Self {
        Self {
            graphs: GraphGenerator::new(log.clone()),
            log,
            metrics,
        }
    }

    /// Single-workflow report for `Some(id)`, fleet report otherwise
    pub fn generate_dashboard(&self, workflow_id: Option<&str>) -> Result<DashboardReport> {
        match workflow_id {
            Some(id) => Ok(DashboardReport::Workflow(Box::new(self.workflow_report(id)?))),
            None => Ok(DashboardReport::Fleet(self.fleet_report())),
        }
    }

    pub fn workflow_report(&self, workflow_id: &str) -> Result<WorkflowReport> {
        validate_workflow_id(workflow_id)?;

        let (trace, trace_error) = split("trace", workflow_id, self.log.get_execution_trace(workflow_id));
        let (graph, graph_error) = split("graph", workflow_id, self.graphs.generate(workflow_id));
        let (event_counts, event_counts_error) =
            split("event_counts", workflow_id, self.log.event_counts(workflow_id));
        let (metrics, metrics_error) = split("metrics", workflow_id, self.workflow_metrics(workflow_id));

        let correlation = match (&trace, &metrics) {
            (Some(trace), Some(metrics)) => Some(Correlation::build(trace, &metrics.records)),
            _ => None,
        };

        Ok(WorkflowReport {
            workflow_id: workflow_id.to_string(),
            generated_at: Utc::now(),
            trace,
            trace_error,
            graph,
            graph_error,
            event_counts,
            event_counts_error,
            metrics,
            metrics_error,
            correlation,
        })
    }

    fn workflow_metrics(&self, workflow_id: &str) -> Result<WorkflowMetrics> {
        let records = self
            .metrics
            .get_metrics(&MetricsQuery::new().workflow(workflow_id))
            .map_err(|e| match e {
                ObserveError::MetricsError { .. } => e,
                other => ObserveError::MetricsError {
                    reason: other.to_string(),
                },
            })?;
        Ok(WorkflowMetrics {
            summary: MetricsSummary::from_metrics(&records),
            records,
        })
    }

    pub fn fleet_report(&self) -> FleetReport {
        let (ids, discovery_error) = match self.log.list_workflows() {
            Ok(ids) => (ids, None),
            Err(e) => {
                tracing::warn!(error = %e, "Workflow discovery failed");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let mut totals = FleetTotals::default();
        let mut workflows = Vec::with_capacity(ids.len());
        for id in ids {
            totals.workflow_count += 1;
            match self.workflow_report(&id) {
                Ok(report) => {
                    if let Some(trace) = &report.trace {
                        if trace.is_complete() {
                            totals.completed += 1;
                        }
                        if trace.has_failed_step() {
                            totals.failed += 1;
                        }
                        totals.total_steps += trace.steps.len();
                    }
                    workflows.push(FleetEntry {
                        workflow_id: id,
                        report: Some(Box::new(report)),
                        error: None,
                    });
                }
                Err(e) => workflows.push(FleetEntry {
                    workflow_id: id,
                    report: None,
                    error: Some(e.to_string()),
                }),
            }
        }

        FleetReport {
            generated_at: Utc::now(),
            workflows,
            discovery_error,
            totals,
        }
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard").field("log", &self.log).finish()
    }
}

/// Value or error message, logged per source
fn split<T>(source: &str, workflow_id: &str, result: Result<T>) -> (Option<T>, Option<String>) {
    match result {
        Ok(value) => (Some(value), None),
        Err(e) => {
            if e.is_informational() {
                tracing::debug!(workflow_id, source, error = %e, "Dashboard source empty");
            } else {
                tracing::warn!(workflow_id, source, error = %e, "Dashboard source unavailable");
            }
            (None, Some(e.to_string()))
        }
    }
}
