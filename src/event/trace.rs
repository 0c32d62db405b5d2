//! Execution trace - read-time reconstruction of a workflow run
//!
//! Recomputed from the event log on every read, never stored.
//! A step gets a duration only when a `step_start` is paired with the next
//! finish/fail/skip sharing its step id.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::log::{Event, EventType, StepStatus};
use crate::util::duration_ms_between;

/// One step of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Empty when the executor emitted step events without an id
    pub step_id: String,
    pub agent: Option<String>,
    pub action: Option<String>,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Number of `step_start` events seen for this step
    pub attempts: u32,
    /// Sequence number of the first event mentioning this step
    pub first_seq: u64,
}

impl TraceStep {
    fn new(step_id: String, first_seq: u64) -> Self {
        Self {
            step_id,
            agent: None,
            action: None,
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            duration_ms: None,
            error: None,
            artifacts: Vec::new(),
            metadata: Map::new(),
            attempts: 0,
            first_seq,
        }
    }

    /// Raw `metadata.requires` value, if the executor declared one
    pub fn requires(&self) -> Option<&Value> {
        self.metadata.get("requires")
    }

    /// `<agent>.<action>` with `unknown` for missing parts
    pub fn operation_name(&self) -> String {
        format!(
            "{}.{}",
            self.agent.as_deref().unwrap_or("unknown"),
            self.action.as_deref().unwrap_or("unknown")
        )
    }

    fn absorb_details(&mut self, event: &Event) {
        if event.agent.is_some() {
            self.agent.clone_from(&event.agent);
        }
        if event.action.is_some() {
            self.action.clone_from(&event.action);
        }
        for (key, value) in &event.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Per-workflow step timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub workflow_id: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub event_count: usize,
    /// Ordered by first appearance in the log
    pub steps: Vec<TraceStep>,
}

impl ExecutionTrace {
    /// Build a trace from events already sorted by `seq`
    pub fn from_events(workflow_id: &str, events: &[Event]) -> Self {
        let mut started_at = None;
        let mut ended_at = None;
        let mut end_status = None;
        let mut steps: Vec<TraceStep> = Vec::new();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();

        for event in events {
            match event.event_type {
                EventType::WorkflowStart => {
                    started_at.get_or_insert(event.timestamp);
                }
                EventType::WorkflowEnd => {
                    ended_at = Some(event.timestamp);
                    end_status = event.status;
                }
                step_type => {
                    let key = event.step_id.clone().unwrap_or_default();
                    let idx = *index.entry(key.clone()).or_insert_with(|| {
                        steps.push(TraceStep::new(key, event.seq));
                        steps.len() - 1
                    });
                    let step = &mut steps[idx];
                    step.absorb_details(event);

                    if step_type == EventType::StepStart {
                        // A new start re-opens the step (retry)
                        step.attempts += 1;
                        step.status = StepStatus::Running;
                        step.started_at = Some(event.timestamp);
                        step.ended_at = None;
                        step.duration_ms = None;
                        step.error = None;
                    } else if let Some(terminal) = step_type.terminal_status() {
                        let open = step.status == StepStatus::Running;
                        step.status = terminal;
                        step.ended_at = Some(event.timestamp);
                        if open {
                            if let Some(start) = step.started_at {
                                step.duration_ms =
                                    Some(duration_ms_between(&start, &event.timestamp));
                            }
                        }
                        if event.error.is_some() {
                            step.error.clone_from(&event.error);
                        }
                        step.artifacts.extend(event.artifacts.iter().cloned());
                    }
                }
            }
        }

        let status = match (ended_at, end_status) {
            (Some(_), Some(status)) => status,
            (Some(_), None) if steps.iter().any(|s| s.status == StepStatus::Failed) => {
                StepStatus::Failed
            }
            (Some(_), None) => StepStatus::Completed,
            (None, _) if events.is_empty() => StepStatus::Pending,
            (None, _) => StepStatus::Running,
        };

        let duration_ms = match (started_at, ended_at) {
            (Some(start), Some(end)) => Some(duration_ms_between(&start, &end)),
            _ => None,
        };

        Self {
            workflow_id: workflow_id.to_string(),
            status,
            started_at,
            ended_at,
            duration_ms,
            event_count: events.len(),
            steps,
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&TraceStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn is_complete(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn has_failed_step(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NewEvent;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    /// Sequence events one second apart
    fn sequence(events: Vec<NewEvent>) -> Vec<Event> {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        events
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.into_event(i as u64 + 1, base + Duration::seconds(i as i64)))
            .collect()
    }

    #[test]
    fn pairs_start_with_terminal() {
        let events = sequence(vec![
            NewEvent::workflow_start("wf"),
            NewEvent::step_start("wf", "s1").agent("coder").action("write"),
            NewEvent::step_finish("wf", "s1").artifacts(["a.rs"]),
            NewEvent::step_start("wf", "s2"),
            NewEvent::step_fail("wf", "s2").error("boom"),
            NewEvent::workflow_end("wf"),
        ]);
        let trace = ExecutionTrace::from_events("wf", &events);

        assert_eq!(trace.steps.len(), 2);
        let s1 = trace.step("s1").unwrap();
        assert_eq!(s1.status, StepStatus::Completed);
        assert_eq!(s1.duration_ms, Some(1000));
        assert_eq!(s1.operation_name(), "coder.write");
        assert_eq!(s1.artifacts, vec!["a.rs".to_string()]);

        let s2 = trace.step("s2").unwrap();
        assert_eq!(s2.status, StepStatus::Failed);
        assert_eq!(s2.error.as_deref(), Some("boom"));

        assert_eq!(trace.status, StepStatus::Failed);
        assert_eq!(trace.duration_ms, Some(5000));
        assert!(trace.is_complete());
        assert!(trace.has_failed_step());
    }

    #[test]
    fn open_step_is_running_without_duration() {
        let events = sequence(vec![
            NewEvent::workflow_start("wf"),
            NewEvent::step_start("wf", "s1"),
        ]);
        let trace = ExecutionTrace::from_events("wf", &events);
        let s1 = trace.step("s1").unwrap();
        assert_eq!(s1.status, StepStatus::Running);
        assert_eq!(s1.duration_ms, None);
        assert_eq!(trace.status, StepStatus::Running);
        assert!(!trace.is_complete());
    }

    #[test]
    fn skip_without_start_has_no_duration() {
        let events = sequence(vec![NewEvent::step_skip("wf", "s1")]);
        let trace = ExecutionTrace::from_events("wf", &events);
        let s1 = trace.step("s1").unwrap();
        assert_eq!(s1.status, StepStatus::Skipped);
        assert_eq!(s1.duration_ms, None);
        assert_eq!(s1.attempts, 0);
    }

    #[test]
    fn restart_reopens_step() {
        let events = sequence(vec![
            NewEvent::step_start("wf", "s1"),
            NewEvent::step_fail("wf", "s1").error("flaky"),
            NewEvent::step_start("wf", "s1"),
            NewEvent::step_finish("wf", "s1"),
        ]);
        let trace = ExecutionTrace::from_events("wf", &events);
        let s1 = trace.step("s1").unwrap();
        assert_eq!(s1.attempts, 2);
        assert_eq!(s1.status, StepStatus::Completed);
        assert_eq!(s1.duration_ms, Some(1000));
        assert_eq!(s1.error, None);
        assert_eq!(s1.first_seq, 1);
    }

    #[test]
    fn explicit_end_status_wins() {
        let events = sequence(vec![
            NewEvent::workflow_start("wf"),
            NewEvent::workflow_end("wf").status(StepStatus::Skipped),
        ]);
        let trace = ExecutionTrace::from_events("wf", &events);
        assert_eq!(trace.status, StepStatus::Skipped);
        assert!(trace.steps.is_empty());
    }

    #[test]
    fn empty_events_are_pending() {
        let trace = ExecutionTrace::from_events("wf", &[]);
        assert_eq!(trace.status, StepStatus::Pending);
        assert_eq!(trace.event_count, 0);
    }

    #[test]
    fn step_without_id_uses_empty_key() {
        let mut start = NewEvent::step_start("wf", "x");
        start.step_id = None;
        let events = sequence(vec![start]);
        let trace = ExecutionTrace::from_events("wf", &events);
        assert_eq!(trace.steps[0].step_id, "");
    }

    #[test]
    fn requires_comes_from_start_metadata() {
        let events = sequence(vec![NewEvent::step_start("wf", "s2").requires(["s1"])]);
        let trace = ExecutionTrace::from_events("wf", &events);
        assert_eq!(
            trace.steps[0].requires(),
            Some(&serde_json::json!(["s1"]))
        );
    }
}
