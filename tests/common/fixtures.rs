//! Test fixtures and helpers

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use nika_observe::event::{EventLog, NewEvent};
use nika_observe::metrics::{MetricsCollector, MetricsOptions, NoopSink, RecordExecution};
use nika_observe::Dashboard;
use tempfile::TempDir;

/// Storage root with an event log and a metrics collector
pub struct Storage {
    pub dir: TempDir,
    pub log: EventLog,
    pub metrics: MetricsCollector,
}

impl Storage {
    pub fn new() -> Self {
        Self::with_flush_threshold(10)
    }

    pub fn with_flush_threshold(flush_threshold: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events"));
        let metrics = MetricsCollector::with_options(
            dir.path().join("metrics"),
            MetricsOptions {
                flush_threshold,
                recent_cache_size: 1000,
                ..MetricsOptions::default()
            },
            Arc::new(NoopSink),
        );
        Self { dir, log, metrics }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn events_dir(&self) -> PathBuf {
        self.dir.path().join("events")
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.dir.path().join("metrics")
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.log.clone(), Arc::new(self.metrics.clone()))
    }
}

/// How a step ends
#[derive(Clone, Copy)]
pub enum Outcome {
    Finish,
    Fail,
    Skip,
    /// No terminal event
    Open,
}

/// Emit start (+ terminal) events for one step
pub fn run_step(log: &EventLog, workflow_id: &str, step_id: &str, agent: &str, action: &str, outcome: Outcome) {
    log.emit_event(
        NewEvent::step_start(workflow_id, step_id)
            .agent(agent)
            .action(action),
    )
    .unwrap();
    let terminal = match outcome {
        Outcome::Finish => NewEvent::step_finish(workflow_id, step_id),
        Outcome::Fail => NewEvent::step_fail(workflow_id, step_id).error(format!("{} failed", step_id)),
        Outcome::Skip => NewEvent::step_skip(workflow_id, step_id),
        Outcome::Open => return,
    };
    log.emit_event(terminal).unwrap();
}

/// s1 completed, s2 failed, s3 still running
pub fn three_step_run(log: &EventLog, workflow_id: &str) {
    log.emit_event(NewEvent::workflow_start(workflow_id)).unwrap();
    run_step(log, workflow_id, "s1", "planner", "plan", Outcome::Finish);
    run_step(log, workflow_id, "s2", "coder", "write", Outcome::Fail);
    run_step(log, workflow_id, "s3", "tester", "run", Outcome::Open);
}

/// Metric for `workflow_id` / `step_id` with the given status
pub fn metric(workflow_id: &str, step_id: &str, status: &str, duration_ms: i64) -> RecordExecution {
    RecordExecution::new(workflow_id, step_id, format!("run {}", step_id), status, duration_ms)
}

/// Persist a finished step run with fixed timings, written straight to the
/// log file: `(step_id, start_secs, end_secs, failed)` offsets from a fixed
/// epoch.
pub fn write_timed_run(storage: &Storage, workflow_id: &str, steps: &[(&str, i64, i64, bool)]) {
    let epoch = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let at = |secs: i64| (epoch + Duration::seconds(secs)).to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let mut lines = Vec::new();
    for (step_id, start, end, failed) in steps {
        lines.push(serde_json::json!({
            "event_type": "step_start",
            "workflow_id": workflow_id,
            "step_id": step_id,
            "agent": "worker",
            "action": step_id,
            "timestamp": at(*start),
        }));
        lines.push(serde_json::json!({
            "event_type": if *failed { "step_fail" } else { "step_finish" },
            "workflow_id": workflow_id,
            "step_id": step_id,
            "timestamp": at(*end),
        }));
    }

    let content: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mut line = line.clone();
            line["seq"] = serde_json::json!(i + 1);
            format!("{}\n", line)
        })
        .collect();
    fs::create_dir_all(storage.events_dir()).unwrap();
    fs::write(storage.log.log_path(workflow_id), content).unwrap();
}
