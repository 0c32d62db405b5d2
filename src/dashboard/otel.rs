//! OpenTelemetry-shaped trace export
//!
//! `resourceSpans[].scopeSpans[].spans[]`, one span per trace step.
//! Span `traceId` and `spanId` carry the step id. Status code 2 is "ok",
//! 1 is "error".

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::report::Dashboard;
use crate::error::{ObserveError, Result};
use crate::event::{StepStatus, TraceStep};
use crate::util::{to_unix_nanos, validate_workflow_id};

pub const SERVICE_NAME: &str = "nika";
pub const STATUS_CODE_OK: u8 = 2;
pub const STATUS_CODE_ERROR: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtelExport {
    pub resource_spans: Vec<ResourceSpans>,
}

impl OtelExport {
    /// All spans across resources and scopes
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.resource_spans
            .iter()
            .flat_map(|r| r.scope_spans.iter())
            .flat_map(|s| s.spans.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    pub resource: Resource,
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSpans {
    pub scope: Scope,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
    pub name: String,
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
    pub status: SpanStatus,
}

impl Span {
    pub fn attribute(&self, key: &str) -> Option<&AnyValue> {
        self.attributes.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStatus {
    pub code: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    fn string(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: AnyValue::StringValue(value.into()),
        }
    }

    fn int(key: &str, value: i64) -> Self {
        Self {
            key: key.to_string(),
            value: AnyValue::IntValue(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnyValue {
    StringValue(String),
    IntValue(i64),
}

impl AnyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringValue(s) => Some(s),
            Self::IntValue(_) => None,
        }
    }
}

fn step_span(step: &TraceStep) -> Span {
    let mut attributes = vec![
        KeyValue::string("step.id", step.step_id.as_str()),
        KeyValue::string("step.agent", step.agent.as_deref().unwrap_or("unknown")),
        KeyValue::string("step.action", step.action.as_deref().unwrap_or("unknown")),
        KeyValue::string("step.status", step.status.as_str()),
    ];
    if let Some(duration_ms) = step.duration_ms {
        attributes.push(KeyValue::int(
            "step.duration_ms",
            i64::try_from(duration_ms).unwrap_or(i64::MAX),
        ));
    }

    let status = if step.status == StepStatus::Failed {
        SpanStatus {
            code: STATUS_CODE_ERROR,
            message: Some(step.error.clone().unwrap_or_else(|| "step failed".to_string())),
        }
    } else {
        SpanStatus {
            code: STATUS_CODE_OK,
            message: None,
        }
    };

    let start = to_unix_nanos(step.started_at.as_ref());
    let end = to_unix_nanos(step.ended_at.as_ref().or(step.started_at.as_ref()));

    Span {
        trace_id: step.step_id.clone(),
        span_id: step.step_id.clone(),
        name: step.operation_name(),
        start_time_unix_nano: start,
        end_time_unix_nano: end,
        attributes,
        status,
    }
}

impl Dashboard {
    /// One resource span for the workflow, one span per step.
    ///
    /// Raises `WorkflowNotFound` / `EmptyWorkflow` / `InvalidTrace` like the
    /// graph generator; anything else becomes `ExportError`.
    pub fn export_otel_trace(&self, workflow_id: &str) -> Result<OtelExport> {
        validate_workflow_id(workflow_id)?;
        let export_error = |reason| ObserveError::ExportError {
            workflow_id: workflow_id.to_string(),
            reason,
        };

        let trace = self
            .log
            .get_execution_trace(workflow_id)
            .map_err(|e| e.or_wrap(export_error))?;

        let spans: Vec<Span> = trace
            .steps
            .iter()
            .filter(|s| !s.step_id.trim().is_empty())
            .map(step_span)
            .collect();
        if spans.is_empty() {
            return Err(ObserveError::EmptyWorkflow {
                workflow_id: workflow_id.to_string(),
            });
        }

        tracing::debug!(workflow_id, spans = spans.len(), "Exported OTel trace");

        Ok(OtelExport {
            resource_spans: vec![ResourceSpans {
                resource: Resource {
                    attributes: vec![
                        KeyValue::string("service.name", SERVICE_NAME),
                        KeyValue::string("workflow.id", workflow_id),
                    ],
                },
                scope_spans: vec![ScopeSpans {
                    scope: Scope {
                        name: env!("CARGO_PKG_NAME").to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    spans,
                }],
            }],
        })
    }

    /// Export and write as pretty JSON
    pub fn write_otel_trace(&self, workflow_id: &str, path: impl AsRef<Path>) -> Result<OtelExport> {
        let export = self.export_otel_trace(workflow_id)?;
        let path = path.as_ref();
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&export)?)
        };
        write().map_err(|e| ObserveError::ExportError {
            workflow_id: workflow_id.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        Ok(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventLog, NewEvent};
    use crate::metrics::NoopSink;
    use crate::metrics::{MetricsCollector, MetricsOptions};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, EventLog, Dashboard) {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events"));
        let metrics = MetricsCollector::with_options(
            dir.path().join("metrics"),
            MetricsOptions::default(),
            Arc::new(NoopSink),
        );
        let dashboard = Dashboard::new(log.clone(), Arc::new(metrics));
        (dir, log, dashboard)
    }

    #[test]
    fn spans_carry_status_codes() {
        let (_dir, log, dashboard) = setup();
        log.emit_event(NewEvent::step_start("wf", "s1").agent("coder").action("write"))
            .unwrap();
        log.emit_event(NewEvent::step_finish("wf", "s1")).unwrap();
        log.emit_event(NewEvent::step_start("wf", "s2").agent("tester").action("run"))
            .unwrap();
        log.emit_event(NewEvent::step_fail("wf", "s2").error("3 tests failed"))
            .unwrap();

        let export = dashboard.export_otel_trace("wf").unwrap();
        let spans: Vec<&Span> = export.spans().collect();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "coder.write");
        assert_eq!(spans[0].status.code, STATUS_CODE_OK);
        assert_eq!(spans[1].name, "tester.run");
        assert_eq!(spans[1].status.code, STATUS_CODE_ERROR);
        assert_eq!(spans[1].status.message.as_deref(), Some("3 tests failed"));
        assert_eq!(spans[0].trace_id, "s1");
        assert!(spans[0].start_time_unix_nano > 0);
        assert!(spans[0].end_time_unix_nano >= spans[0].start_time_unix_nano);
    }

    #[test]
    fn missing_timestamps_are_zero() {
        let (_dir, log, dashboard) = setup();
        log.emit_event(NewEvent::step_skip("wf", "skipped")).unwrap();

        let export = dashboard.export_otel_trace("wf").unwrap();
        let span = export.spans().next().unwrap();
        assert_eq!(span.start_time_unix_nano, 0);
        assert_eq!(span.name, "unknown.unknown");
        assert_eq!(span.status.code, STATUS_CODE_OK);
    }

    #[test]
    fn export_reuses_trace_errors() {
        let (_dir, log, dashboard) = setup();
        assert!(matches!(
            dashboard.export_otel_trace("ghost").unwrap_err(),
            ObserveError::WorkflowNotFound { .. }
        ));

        log.emit_event(NewEvent::workflow_start("idle")).unwrap();
        assert!(matches!(
            dashboard.export_otel_trace("idle").unwrap_err(),
            ObserveError::EmptyWorkflow { .. }
        ));
    }

    #[test]
    fn json_uses_otlp_field_names() {
        let (dir, log, dashboard) = setup();
        log.emit_event(NewEvent::step_start("wf", "s1")).unwrap();

        let path = dir.path().join("out/trace.json");
        dashboard.write_otel_trace("wf", &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        let resource = &json["resourceSpans"][0];
        assert_eq!(resource["resource"]["attributes"][0]["key"], "service.name");
        assert_eq!(resource["resource"]["attributes"][0]["value"]["stringValue"], "nika");
        let span = &resource["scopeSpans"][0]["spans"][0];
        assert_eq!(span["spanId"], "s1");
        assert!(span["startTimeUnixNano"].is_u64());
    }
}
