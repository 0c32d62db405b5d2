// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Observe Error Types with Error Codes
//!
//! Error code ranges:
//! - OBS-000-009: Workflow id errors
//! - OBS-010-019: Trace / graph errors
//! - OBS-020-029: Metrics errors
//! - OBS-030-039: Dashboard / export errors
//! - OBS-080-089: Config errors
//! - OBS-090-099: IO / serialization errors
//!
//! Hard vs soft: `InvalidWorkflowId` aborts any operation. Everything the
//! dashboard can degrade around is reported per source instead.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ObserveError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug, Diagnostic)]
pub enum ObserveError {
    // ═══════════════════════════════════════════
    // WORKFLOW ID (000-009)
    // ═══════════════════════════════════════════
    #[error("[OBS-001] Invalid workflow id '{id}': {reason}")]
    #[diagnostic(
        code(observe::invalid_workflow_id),
        help("Use letters, digits, '-', '_' or '.' only")
    )]
    InvalidWorkflowId { id: String, reason: String },

    // ═══════════════════════════════════════════
    // TRACE / GRAPH (010-019)
    // ═══════════════════════════════════════════
    #[error("[OBS-010] No such workflow: '{workflow_id}'")]
    #[diagnostic(code(observe::workflow_not_found))]
    WorkflowNotFound { workflow_id: String },

    #[error("[OBS-011] Workflow '{workflow_id}' has no output yet")]
    #[diagnostic(code(observe::empty_workflow))]
    EmptyWorkflow { workflow_id: String },

    #[error("[OBS-012] Invalid trace for workflow '{workflow_id}': {reason}")]
    #[diagnostic(code(observe::invalid_trace))]
    InvalidTrace { workflow_id: String, reason: String },

    #[error("[OBS-013] Graph generation failed for '{workflow_id}': {reason}")]
    #[diagnostic(code(observe::graph_generation))]
    GraphGeneration { workflow_id: String, reason: String },

    // ═══════════════════════════════════════════
    // METRICS (020-029)
    // ═══════════════════════════════════════════
    #[error("[OBS-020] Invalid {field}: {reason}")]
    #[diagnostic(code(observe::validation_error))]
    ValidationError { field: String, reason: String },

    #[error("[OBS-021] Metrics unavailable: {reason}")]
    #[diagnostic(code(observe::metrics_error))]
    MetricsError { reason: String },

    // ═══════════════════════════════════════════
    // DASHBOARD / EXPORT (030-039)
    // ═══════════════════════════════════════════
    #[error("[OBS-030] Dashboard generation failed: {reason}")]
    #[diagnostic(code(observe::dashboard_error))]
    DashboardError { reason: String },

    #[error("[OBS-031] Trace export failed for '{workflow_id}': {reason}")]
    #[diagnostic(code(observe::export_error))]
    ExportError { workflow_id: String, reason: String },

    // ═══════════════════════════════════════════
    // CONFIG (080-089)
    // ═══════════════════════════════════════════
    #[error("[OBS-080] Configuration error: {reason}")]
    #[diagnostic(code(observe::config_error))]
    ConfigError { reason: String },

    // ═══════════════════════════════════════════
    // IO (090-099)
    // ═══════════════════════════════════════════
    #[error("[OBS-090] IO error: {0}")]
    #[diagnostic(code(observe::io_error))]
    Io(#[from] std::io::Error),

    #[error("[OBS-091] JSON error: {0}")]
    #[diagnostic(code(observe::json_error))]
    Json(#[from] serde_json::Error),
}

impl ObserveError {
    /// Get the error code (e.g., "OBS-010")
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidWorkflowId { .. } => "OBS-001",
            Self::WorkflowNotFound { .. } => "OBS-010",
            Self::EmptyWorkflow { .. } => "OBS-011",
            Self::InvalidTrace { .. } => "OBS-012",
            Self::GraphGeneration { .. } => "OBS-013",
            Self::ValidationError { .. } => "OBS-020",
            Self::MetricsError { .. } => "OBS-021",
            Self::DashboardError { .. } => "OBS-030",
            Self::ExportError { .. } => "OBS-031",
            Self::ConfigError { .. } => "OBS-080",
            Self::Io(_) => "OBS-090",
            Self::Json(_) => "OBS-091",
        }
    }

    /// "Nothing to show yet" rather than a failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::EmptyWorkflow { .. })
    }

    /// Errors that describe the workflow's persisted state (absent, empty,
    /// malformed). Graph and export callers pass these through unchanged.
    pub fn is_trace_state(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound { .. } | Self::EmptyWorkflow { .. } | Self::InvalidTrace { .. }
        )
    }

    /// Keep id and trace-state errors, wrap anything else with `wrap`
    pub(crate) fn or_wrap(self, wrap: impl FnOnce(String) -> ObserveError) -> ObserveError {
        if self.is_trace_state() || matches!(self, Self::InvalidWorkflowId { .. }) {
            self
        } else {
            wrap(self.to_string())
        }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl FixSuggestion for ObserveError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::InvalidWorkflowId { .. } => Some("Workflow ids name log files: avoid '/', '\\' and '..'"),
            Self::WorkflowNotFound { .. } => {
                Some("Check the id with `nika-observe dashboard` (lists known workflows)")
            }
            Self::EmptyWorkflow { .. } => Some("Wait for the workflow to start its first step"),
            Self::InvalidTrace { .. } => Some("Inspect the workflow's .jsonl log for corrupted lines"),
            Self::GraphGeneration { .. } => Some("Re-run with RUST_LOG=debug for details"),
            Self::ValidationError { .. } => {
                Some("Status must be one of: success, failed, timeout, cancelled, running")
            }
            Self::MetricsError { .. } => Some("Check the metrics directory is readable"),
            Self::DashboardError { .. } => Some("Re-run with RUST_LOG=debug for details"),
            Self::ExportError { .. } => Some("Check the output path is writable"),
            Self::ConfigError { .. } => Some("Check ~/.config/nika/observe.toml syntax"),
            Self::Io(_) => Some("Check file path and permissions"),
            Self::Json(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let err = ObserveError::WorkflowNotFound {
            workflow_id: "wf-1".into(),
        };
        assert!(err.to_string().contains("OBS-010"));
        assert!(err.to_string().contains("wf-1"));
        assert_eq!(err.code(), "OBS-010");
    }

    #[test]
    fn test_empty_workflow_is_informational() {
        let empty = ObserveError::EmptyWorkflow {
            workflow_id: "wf".into(),
        };
        assert!(empty.is_informational());
        assert!(empty.is_trace_state());

        let io = ObserveError::Io(std::io::Error::other("disk"));
        assert!(!io.is_informational());
        assert!(!io.is_trace_state());
    }

    #[test]
    fn test_every_variant_has_code_prefix() {
        let errors = vec![
            ObserveError::validation("status", "bogus"),
            ObserveError::InvalidTrace {
                workflow_id: "wf".into(),
                reason: "bad".into(),
            },
            ObserveError::ConfigError {
                reason: "x".into(),
            },
        ];
        for err in errors {
            assert!(err.to_string().starts_with(&format!("[{}]", err.code())));
        }
    }

    #[test]
    fn test_or_wrap_keeps_trace_state() {
        let wrap = |reason| ObserveError::DashboardError { reason };

        let not_found = ObserveError::WorkflowNotFound {
            workflow_id: "wf".into(),
        };
        assert_eq!(not_found.or_wrap(wrap).code(), "OBS-010");

        let io = ObserveError::Io(std::io::Error::other("disk"));
        let wrapped = io.or_wrap(wrap);
        assert_eq!(wrapped.code(), "OBS-030");
        assert!(wrapped.to_string().contains("disk"));
    }

    #[test]
    fn test_fix_suggestion_present() {
        let err = ObserveError::validation("status", "bogus");
        assert!(err.fix_suggestion().is_some());
    }
}
