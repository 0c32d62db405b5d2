//! Nika Observe - execution history, graphs, metrics and dashboards
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      RECORDING (leaves)                      │
//! │  event/     Append-only workflow event log + subscriptions   │
//! │  metrics/   Buffered, date-partitioned step metrics          │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     RECONSTRUCTION                           │
//! │  graph/     Execution DAG from traces (DOT, Mermaid)         │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        REPORTING                             │
//! │  dashboard/ Correlated reports + OpenTelemetry export        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`event`] | `EventLog`, `Event`, `ExecutionTrace` |
//! | [`metrics`] | `MetricsCollector`, `MetricsQuery`, `MetricsSummary` |
//! | [`graph`] | `GraphGenerator`, `ExecutionGraph` |
//! | [`dashboard`] | `Dashboard`, reports, `OtelExport` |
//! | [`config`] | `~/.config/nika/observe.toml` + env overrides |
//! | [`error`] | Error types with codes and fix suggestions |
//!
//! Everything is synchronous. Each component owns its storage root; share
//! one instance per root by cloning it.

// ═══════════════════════════════════════════════════════════════
// RECORDING
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod metrics;

// ═══════════════════════════════════════════════════════════════
// RECONSTRUCTION + REPORTING
// ═══════════════════════════════════════════════════════════════
pub mod dashboard;
pub mod graph;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use config::ObserveConfig;
pub use dashboard::{Dashboard, DashboardReport, OtelExport};
pub use error::{FixSuggestion, ObserveError, Result};
pub use event::{Event, EventFilter, EventLog, EventType, NewEvent, StepStatus};
pub use graph::{EdgeType, ExecutionGraph, GraphGenerator};
pub use metrics::{MetricsCollector, MetricsQuery, MetricsSummary, RecordExecution};
