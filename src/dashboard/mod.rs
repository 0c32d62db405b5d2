//! Dashboard Module - correlated reports and trace export
//!
//! - `Dashboard::generate_dashboard`: single-workflow or fleet report with
//!   per-source `<field>_error` degradation
//! - `Dashboard::export_otel_trace`: OTLP-shaped JSON spans

mod otel;
mod report;

pub use otel::{
    AnyValue, KeyValue, OtelExport, Resource, ResourceSpans, Scope, ScopeSpans, Span, SpanStatus,
    SERVICE_NAME, STATUS_CODE_ERROR, STATUS_CODE_OK,
};
pub use report::{
    Bottleneck, Correlation, Dashboard, DashboardReport, FleetEntry, FleetReport, FleetTotals,
    StepCorrelation, WorkflowMetrics, WorkflowReport,
};
