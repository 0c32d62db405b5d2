//! Event envelope for workflow lifecycle logs
//!
//! - Event: typed envelope (type, ids, seq, timestamp, status) + opaque metadata map
//! - EventType: 6 lifecycle variants (workflow/step level)
//! - NewEvent: builder handed to `EventLog::emit_event`, which stamps seq + time

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // ═══════════════════════════════════════════
    // WORKFLOW LEVEL
    // ═══════════════════════════════════════════
    WorkflowStart,
    WorkflowEnd,

    // ═══════════════════════════════════════════
    // STEP LEVEL
    // ═══════════════════════════════════════════
    StepStart,
    StepFinish,
    StepFail,
    StepSkip,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        Self::WorkflowStart,
        Self::WorkflowEnd,
        Self::StepStart,
        Self::StepFinish,
        Self::StepFail,
        Self::StepSkip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowStart => "workflow_start",
            Self::WorkflowEnd => "workflow_end",
            Self::StepStart => "step_start",
            Self::StepFinish => "step_finish",
            Self::StepFail => "step_fail",
            Self::StepSkip => "step_skip",
        }
    }

    /// Check if this is a workflow-level event
    pub fn is_workflow_event(&self) -> bool {
        matches!(self, Self::WorkflowStart | Self::WorkflowEnd)
    }

    /// Finish, fail or skip: closes an open step
    pub fn is_step_terminal(&self) -> bool {
        matches!(self, Self::StepFinish | Self::StepFail | Self::StepSkip)
    }

    /// Status a step ends in when this event closes it
    pub fn terminal_status(&self) -> Option<StepStatus> {
        match self {
            Self::StepFinish => Some(StepStatus::Completed),
            Self::StepFail => Some(StepStatus::Failed),
            Self::StepSkip => Some(StepStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step / workflow status as carried by events, traces and graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    #[default]
    #[serde(other)]
    Unknown,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single persisted event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub workflow_id: String,
    /// Per-workflow sequence number, starts at 1
    pub seq: u64,
    /// UTC, serialized with a `Z` suffix
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    /// Open-ended payload (requires, gate results, executor extras)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_summary: Option<String>,
}

impl Event {
    /// Step id if this is a step-level event
    pub fn step_id(&self) -> Option<&str> {
        self.step_id.as_deref()
    }
}

/// Event content before sequencing
///
/// Built by the executor at lifecycle boundaries:
///
/// ```rust,ignore
/// log.emit_event(
///     NewEvent::step_start("wf-42", "build")
///         .agent("coder")
///         .action("compile")
///         .requires(["fetch"]),
/// )?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: EventType,
    pub workflow_id: String,
    pub step_id: Option<String>,
    pub agent: Option<String>,
    pub action: Option<String>,
    pub status: Option<StepStatus>,
    pub error: Option<String>,
    pub artifacts: Vec<String>,
    pub metadata: Map<String, Value>,
    pub rationale: Option<String>,
    pub tool_call_summary: Option<String>,
}

impl NewEvent {
    pub fn new(event_type: EventType, workflow_id: impl Into<String>) -> Self {
        Self {
            event_type,
            workflow_id: workflow_id.into(),
            step_id: None,
            agent: None,
            action: None,
            status: None,
            error: None,
            artifacts: Vec::new(),
            metadata: Map::new(),
            rationale: None,
            tool_call_summary: None,
        }
    }

    pub fn workflow_start(workflow_id: impl Into<String>) -> Self {
        Self::new(EventType::WorkflowStart, workflow_id)
    }

    pub fn workflow_end(workflow_id: impl Into<String>) -> Self {
        Self::new(EventType::WorkflowEnd, workflow_id)
    }

    pub fn step_start(workflow_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self::new(EventType::StepStart, workflow_id).step(step_id)
    }

    pub fn step_finish(workflow_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self::new(EventType::StepFinish, workflow_id).step(step_id)
    }

    pub fn step_fail(workflow_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self::new(EventType::StepFail, workflow_id).step(step_id)
    }

    pub fn step_skip(workflow_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self::new(EventType::StepSkip, workflow_id).step(step_id)
    }

    pub fn step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn status(mut self, status: StepStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn artifacts<I, S>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts = artifacts.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set a single metadata entry
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Declare the steps this step depends on (`metadata.requires`)
    pub fn requires<I, S>(self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<Value> = steps
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect();
        self.meta("requires", Value::Array(list))
    }

    pub fn rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn tool_call_summary(mut self, summary: impl Into<String>) -> Self {
        self.tool_call_summary = Some(summary.into());
        self
    }

    pub(crate) fn into_event(self, seq: u64, timestamp: DateTime<Utc>) -> Event {
        Event {
            event_type: self.event_type,
            workflow_id: self.workflow_id,
            seq,
            timestamp,
            step_id: self.step_id,
            agent: self.agent,
            action: self.action,
            status: self.status,
            error: self.error,
            artifacts: self.artifacts,
            metadata: self.metadata,
            rationale: self.rationale,
            tool_call_summary: self.tool_call_summary,
        }
    }
}
