//! Execution metric records
//!
//! `RecordExecution` carries raw executor input (status as text, signed
//! counters). Converting it into an `ExecutionMetric` validates everything;
//! an invalid record never reaches the buffer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ObserveError, Result};
use crate::util::validate_workflow_id;

/// Outcome of one step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Success,
    Failed,
    Timeout,
    Cancelled,
    Running,
}

impl MetricStatus {
    pub const ALL: [MetricStatus; 5] = [
        Self::Success,
        Self::Failed,
        Self::Timeout,
        Self::Cancelled,
        Self::Running,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Running => "running",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricStatus {
    type Err = ObserveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ObserveError::validation(
                    "status",
                    format!("'{}' is not one of success, failed, timeout, cancelled, running", s),
                )
            })
    }
}

/// Immutable, validated execution record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetric {
    pub execution_id: String,
    pub workflow_id: String,
    pub step_id: String,
    pub command: String,
    pub status: MetricStatus,
    pub duration_ms: u64,
    pub retry_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    /// Quality gate outcome, absent when no gate ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_pass: Option<bool>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ExecutionMetric {
    /// Skill bucket used for grouping
    pub fn skill_or_unknown(&self) -> &str {
        self.skill.as_deref().unwrap_or("unknown")
    }
}

/// Raw input for `MetricsCollector::record_execution`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordExecution {
    pub execution_id: Option<String>,
    pub workflow_id: String,
    pub step_id: String,
    pub command: String,
    pub status: String,
    pub duration_ms: i64,
    pub retry_count: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub skill: Option<String>,
    pub gate_pass: Option<bool>,
    pub metadata: Map<String, Value>,
}

impl RecordExecution {
    pub fn new(
        workflow_id: impl Into<String>,
        step_id: impl Into<String>,
        command: impl Into<String>,
        status: impl Into<String>,
        duration_ms: i64,
    ) -> Self {
        Self {
            execution_id: None,
            workflow_id: workflow_id.into(),
            step_id: step_id.into(),
            command: command.into(),
            status: status.into(),
            duration_ms,
            retry_count: 0,
            started_at: None,
            completed_at: None,
            skill: None,
            gate_pass: None,
            metadata: Map::new(),
        }
    }

    pub fn execution_id(mut self, id: impl Into<String>) -> Self {
        self.execution_id = Some(id.into());
        self
    }

    pub fn retries(mut self, retry_count: i64) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }

    pub fn gate_pass(mut self, passed: bool) -> Self {
        self.gate_pass = Some(passed);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl TryFrom<RecordExecution> for ExecutionMetric {
    type Error = ObserveError;

    fn try_from(input: RecordExecution) -> Result<Self> {
        validate_workflow_id(&input.workflow_id)
            .map_err(|e| ObserveError::validation("workflow_id", e.to_string()))?;
        if input.step_id.trim().is_empty() {
            return Err(ObserveError::validation("step_id", "cannot be empty"));
        }

        let status: MetricStatus = input.status.parse()?;

        let duration_ms = u64::try_from(input.duration_ms).map_err(|_| {
            ObserveError::validation(
                "duration_ms",
                format!("must be >= 0, got {}", input.duration_ms),
            )
        })?;
        let retry_count = u32::try_from(input.retry_count).map_err(|_| {
            ObserveError::validation(
                "retry_count",
                format!("must be >= 0, got {}", input.retry_count),
            )
        })?;

        let out_of_range = || ObserveError::validation("duration_ms", "out of range");
        let elapsed = Duration::try_milliseconds(input.duration_ms).ok_or_else(out_of_range)?;
        let (started_at, completed_at) = match (input.started_at, input.completed_at) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (
                start,
                start.checked_add_signed(elapsed).ok_or_else(out_of_range)?,
            ),
            (None, end) => {
                let end = end.unwrap_or_else(Utc::now);
                (end.checked_sub_signed(elapsed).ok_or_else(out_of_range)?, end)
            }
        };
        if completed_at < started_at {
            return Err(ObserveError::validation(
                "completed_at",
                "must not be before started_at",
            ));
        }

        Ok(Self {
            execution_id: input
                .execution_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            workflow_id: input.workflow_id,
            step_id: input.step_id,
            command: input.command,
            status,
            duration_ms,
            retry_count,
            started_at,
            completed_at,
            skill: input.skill,
            gate_pass: input.gate_pass,
            metadata: input.metadata,
        })
    }
}
