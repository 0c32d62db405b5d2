//! EventLog - durable, append-only workflow event store
//!
//! One line-delimited JSON file per workflow (`<dir>/<workflow_id>.jsonl`).
//!
//! Durability model:
//! - every event is opened, appended, flushed and `sync_data`'d before
//!   `emit_event` returns (no pre-durability buffering, unlike metrics)
//! - a failed write is logged and swallowed; the in-memory ring buffer and
//!   subscribers still see the event
//!
//! Ordering: sequence assignment, the file append and the ring buffer update
//! happen under one lock. Subscribers are snapshotted under that lock and
//! called after it is released, so callbacks may subscribe, unsubscribe or
//! emit. Only one process may write a given workflow's file.

use std::collections::{BTreeMap, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use walkdir::WalkDir;

use super::log::{Event, NewEvent};
use super::subscribe::{EventCallback, EventFilter, Subscription, SubscriptionId};
use super::trace::{ExecutionTrace, TraceStep};
use crate::error::{ObserveError, Result};
use crate::util::{validate_workflow_id, EVENT_LOG_EXTENSION, RING_BUFFER_SIZE};

/// State guarded by the EventLog lock
#[derive(Default)]
struct EventLogState {
    /// workflow_id -> last assigned seq
    sequences: FxHashMap<String, u64>,
    /// workflow_id -> most recent events
    buffers: FxHashMap<String, VecDeque<Event>>,
    subscribers: BTreeMap<SubscriptionId, Subscription>,
    next_subscription: u64,
}

/// Parsed log file
struct LoadedLog {
    events: Vec<Event>,
    malformed: usize,
}

/// Only the sequence number is needed to resume numbering
#[derive(Deserialize)]
struct SeqOnly {
    seq: u64,
}

/// Thread-safe, persistent event log. Clones share state.
#[derive(Clone)]
pub struct EventLog {
    dir: Arc<PathBuf>,
    ring_capacity: usize,
    state: Arc<Mutex<EventLogState>>,
}

impl EventLog {
    /// Event log rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_capacity(dir, RING_BUFFER_SIZE)
    }

    /// Event log with a custom per-workflow ring buffer size
    pub fn with_capacity(dir: impl Into<PathBuf>, ring_capacity: usize) -> Self {
        Self {
            dir: Arc::new(dir.into()),
            ring_capacity: ring_capacity.max(1),
            state: Arc::new(Mutex::new(EventLogState::default())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Log file for a workflow
    pub fn log_path(&self, workflow_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", workflow_id, EVENT_LOG_EXTENSION))
    }

    // ═══════════════════════════════════════════════════════════════
    // WRITE PATH
    // ═══════════════════════════════════════════════════════════════

    /// Sequence, persist, buffer and deliver an event.
    ///
    /// Only an invalid workflow id is an error. Disk failures are logged and
    /// never reach the caller.
    pub fn emit_event(&self, new: NewEvent) -> Result<Event> {
        validate_workflow_id(&new.workflow_id)?;

        let (event, subscribers) = {
            let mut state = self.state.lock();

            // Unrecoverable logs are retried on the next emit, never cached
            let (last, known) = match state.sequences.get(&new.workflow_id) {
                Some(seq) => (*seq, true),
                None => {
                    let ring_last = state
                        .buffers
                        .get(&new.workflow_id)
                        .and_then(|buffer| buffer.back())
                        .map_or(0, |event| event.seq);
                    match self.recover_last_seq(&new.workflow_id) {
                        Some(seq) => (seq.max(ring_last), true),
                        None => (ring_last, false),
                    }
                }
            };
            let seq = last + 1;
            if known {
                state.sequences.insert(new.workflow_id.clone(), seq);
            }

            let event = new.into_event(seq, Utc::now());

            // Durability attempt; its failure must not block buffering or delivery
            if let Err(e) = self.append(&event) {
                tracing::error!(
                    workflow_id = %event.workflow_id,
                    seq = event.seq,
                    error = %e,
                    "Failed to persist event"
                );
            }

            let buffer = state
                .buffers
                .entry(event.workflow_id.clone())
                .or_default();
            if buffer.len() >= self.ring_capacity {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());

            let subscribers: Vec<Subscription> = state
                .subscribers
                .values()
                .filter(|s| s.filter.matches(&event))
                .cloned()
                .collect();

            (event, subscribers)
        };

        Self::deliver(&event, &subscribers);
        Ok(event)
    }

    fn append(&self, event: &Event) -> std::io::Result<()> {
        fs::create_dir_all(self.dir.as_ref())?;
        let line = serde_json::to_string(event)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(&event.workflow_id))?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        file.sync_data()
    }

    /// Last seq persisted for a workflow, 0 if none.
    ///
    /// `None` when the log exists but cannot be read.
    fn recover_last_seq(&self, workflow_id: &str) -> Option<u64> {
        let path = self.log_path(workflow_id);
        let unreadable = |e: std::io::Error| {
            tracing::warn!(path = %path.display(), error = %e, "Cannot recover sequence");
        };
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Some(0),
            Err(e) => {
                unreadable(e);
                return None;
            }
        };

        let mut last = 0;
        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) => {
                    if let Ok(entry) = serde_json::from_str::<SeqOnly>(&line) {
                        last = last.max(entry.seq);
                    }
                }
                Err(e) => {
                    unreadable(e);
                    return None;
                }
            }
        }
        Some(last)
    }

    fn deliver(event: &Event, subscribers: &[Subscription]) {
        for sub in subscribers {
            match catch_unwind(AssertUnwindSafe(|| (sub.callback)(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    workflow_id = %event.workflow_id,
                    seq = event.seq,
                    error = %e,
                    "Subscriber failed"
                ),
                Err(_) => tracing::warn!(
                    workflow_id = %event.workflow_id,
                    seq = event.seq,
                    "Subscriber panicked"
                ),
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // SUBSCRIPTIONS
    // ═══════════════════════════════════════════════════════════════

    /// Register a callback for future events. `None` matches everything.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
        filter: Option<EventFilter>,
    ) -> SubscriptionId {
        let callback: EventCallback = Arc::new(callback);
        let mut state = self.state.lock();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.subscribers.insert(
            id,
            Subscription {
                callback,
                filter: filter.unwrap_or_default(),
            },
        );
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.lock().subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    // ═══════════════════════════════════════════════════════════════
    // READ PATH
    // ═══════════════════════════════════════════════════════════════

    /// Re-parse a workflow's log, sorted by seq.
    ///
    /// Malformed lines are skipped with a warning. A missing file is an
    /// empty result. `limit` keeps the most recent events.
    pub fn read_events(&self, workflow_id: &str, limit: Option<usize>) -> Result<Vec<Event>> {
        validate_workflow_id(workflow_id)?;
        let mut events = self.load(workflow_id)?.events;
        if let Some(limit) = limit {
            let skip = events.len().saturating_sub(limit);
            events.drain(..skip);
        }
        Ok(events)
    }

    fn load(&self, workflow_id: &str) -> Result<LoadedLog> {
        let path = self.log_path(workflow_id);
        if !path.is_file() {
            return Ok(LoadedLog {
                events: Vec::new(),
                malformed: 0,
            });
        }
        let file = File::open(&path)?;

        let mut events = Vec::new();
        let mut malformed = 0;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(path = %path.display(), line = index + 1, error = %e, "Unreadable event line");
                    malformed += 1;
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(path = %path.display(), line = index + 1, error = %e, "Skipping malformed event");
                    malformed += 1;
                }
            }
        }

        events.sort_by_key(|e| e.seq);
        Ok(LoadedLog { events, malformed })
    }

    /// Most recent in-memory events for a workflow (oldest first)
    pub fn recent_events(&self, workflow_id: &str, limit: usize) -> Vec<Event> {
        let state = self.state.lock();
        state
            .buffers
            .get(workflow_id)
            .map(|buffer| {
                let skip = buffer.len().saturating_sub(limit);
                buffer.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Known on disk, or seen by this instance
    pub fn workflow_exists(&self, workflow_id: &str) -> bool {
        self.log_path(workflow_id).is_file() || self.state.lock().buffers.contains_key(workflow_id)
    }

    /// Workflow ids with a persisted log, sorted
    pub fn list_workflows(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in WalkDir::new(self.dir.as_ref()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ObserveError::Io(e.into()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(EVENT_LOG_EXTENSION)
            {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_workflow_id(id).is_ok() {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Raw counts per event type
    pub fn event_counts(&self, workflow_id: &str) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for event in self.read_events(workflow_id, None)? {
            *counts.entry(event.event_type.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    // ═══════════════════════════════════════════════════════════════
    // TRACE
    // ═══════════════════════════════════════════════════════════════

    /// Reconstruct the workflow's step timeline.
    ///
    /// - unknown workflow -> `WorkflowNotFound`
    /// - log present but nothing parseable -> `InvalidTrace`
    pub fn get_execution_trace(&self, workflow_id: &str) -> Result<ExecutionTrace> {
        validate_workflow_id(workflow_id)?;
        if !self.workflow_exists(workflow_id) {
            return Err(ObserveError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            });
        }

        let loaded = self.load(workflow_id)?;
        if loaded.events.is_empty() && loaded.malformed > 0 {
            return Err(ObserveError::InvalidTrace {
                workflow_id: workflow_id.to_string(),
                reason: format!("{} malformed line(s), no readable events", loaded.malformed),
            });
        }

        let events = if loaded.events.is_empty() {
            // Persistence may have failed; fall back to what this instance saw
            self.recent_events(workflow_id, self.ring_capacity)
        } else {
            loaded.events
        };

        Ok(ExecutionTrace::from_events(workflow_id, &events))
    }

    /// Step records of a workflow, in first-appearance order
    pub fn get_execution_history(&self, workflow_id: &str) -> Result<Vec<TraceStep>> {
        Ok(self.get_execution_trace(workflow_id)?.steps)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventLog")
            .field("dir", &self.dir)
            .field("workflows", &state.sequences.len())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}
