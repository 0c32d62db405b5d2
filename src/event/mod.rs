//! Event Module - durable workflow lifecycle log
//!
//! Key types:
//! - `Event`: envelope with type + ids + seq + UTC timestamp + metadata
//! - `NewEvent`: builder passed to `EventLog::emit_event`
//! - `EventLog`: append-only per-workflow JSONL store with subscriptions
//! - `EventFilter`: subscription filter (sets + custom predicate)
//! - `ExecutionTrace`: per-step timeline derived on read

mod log;
mod store;
mod subscribe;
mod trace;

// Re-export all public types
pub use log::{Event, EventType, NewEvent, StepStatus};
pub use store::EventLog;
pub use subscribe::{EventCallback, EventFilter, EventPredicate, SubscriptionId};
pub use trace::{ExecutionTrace, TraceStep};
